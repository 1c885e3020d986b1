// src/io/serial/utils.rs
//
// Shared utilities for the base station serial port.
// Provides port settings conversions for the serialport crate and device discovery.

use serde::{Deserialize, Serialize};
use serialport::{DataBits, Parity as SpParity, StopBits};
use std::path::Path;

// ============================================================================
// Types
// ============================================================================

/// Parity setting for serial port configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub product: Option<String>,
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert our Parity enum to serialport crate's Parity type
pub fn to_serialport_parity(p: &Parity) -> SpParity {
    match p {
        Parity::None => SpParity::None,
        Parity::Odd => SpParity::Odd,
        Parity::Even => SpParity::Even,
    }
}

/// Convert data bits count to serialport crate's DataBits type
pub fn to_serialport_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

/// Convert stop bits count to serialport crate's StopBits type
pub fn to_serialport_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Device file name fragment the base station enumerates as on this platform.
pub fn platform_device_pattern() -> Option<&'static str> {
    if cfg!(target_os = "linux") {
        Some("ACM")
    } else if cfg!(target_os = "macos") {
        Some("tty.usbmodem")
    } else {
        None
    }
}

/// Scan `dir` for the first device file whose name contains `pattern`.
///
/// Entries are visited in name order so the pick is stable when several
/// adapters are plugged in. An unreadable directory is treated like an
/// empty one; callers retry after their backoff.
pub fn find_device(dir: &Path, pattern: &str) -> Option<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("[serial] Cannot scan {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.contains(pattern))
        .collect();
    names.sort();

    names
        .into_iter()
        .next()
        .map(|name| dir.join(name).to_string_lossy().to_string())
}

/// List serial ports known to the OS.
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, serialport::Error> {
    let ports = serialport::available_ports()?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, product) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => ("USB".to_string(), info.product),
                serialport::SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None),
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None),
                serialport::SerialPortType::Unknown => ("Unknown".to_string(), None),
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                product,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
