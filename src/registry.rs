// src/registry.rs
//
// Fixed-size table of per-remote answers, indexed by device address.

use serde::Serialize;

/// One voting remote's answer for the current round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DeviceSlot {
    pub address: u8,
    /// None until the remote answers
    pub value: Option<u8>,
}

impl DeviceSlot {
    fn new(address: u8) -> Self {
        Self { address, value: None }
    }

    pub fn answered(&self) -> bool {
        self.value.is_some()
    }

    /// Value with `-1` standing in for "no answer yet"
    pub fn raw_value(&self) -> i32 {
        self.value.map(i32::from).unwrap_or(-1)
    }
}

/// Answers for addresses `0..len()`.
///
/// Out-of-range addresses never panic: lookups return None and mutations
/// report `false`.
#[derive(Clone, Debug)]
pub struct DeviceRegistry {
    slots: Vec<DeviceSlot>,
}

impl DeviceRegistry {
    /// `device_count` is capped at 256, the one-byte address space.
    pub fn new(device_count: usize) -> Self {
        let slots = (0..device_count.min(256))
            .map(|address| DeviceSlot::new(address as u8))
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Address of slot `address` if it exists in this registry.
    pub fn address(&self, address: i64) -> Option<u8> {
        usize::try_from(address)
            .ok()
            .filter(|idx| *idx < self.slots.len())
            .map(|idx| idx as u8)
    }

    pub fn get(&self, address: u8) -> Option<DeviceSlot> {
        self.slots.get(address as usize).copied()
    }

    pub fn set(&mut self, address: u8, value: u8) -> bool {
        match self.slots.get_mut(address as usize) {
            Some(slot) => {
                slot.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self, address: u8) -> bool {
        match self.slots.get_mut(address as usize) {
            Some(slot) => {
                slot.value = None;
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
    }

    pub fn answered(&self, address: u8) -> bool {
        self.get(address).is_some_and(|slot| slot.answered())
    }

    pub fn answered_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.answered()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceSlot> {
        self.slots.iter()
    }
}
