// src/question.rs
//
// The active question and the answers collected for it.
//
// Registry and mode share one lock: the read loop stores answers under it
// and start/stop/inject take it for resets and tallies. Commands to the base
// station are always sent with the lock released.

use serde::Serialize;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::codec::{is_valid_value, Command, VoteFrame};
use crate::io::error::LinkError;
use crate::io::link::FrameHandler;
use crate::registry::{DeviceRegistry, DeviceSlot};
use crate::tally::Tally;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum QuestionMode {
    /// No question started since launch
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "two")]
    TwoChoice,
    #[serde(rename = "multiple")]
    MultipleChoice,
}

impl QuestionMode {
    pub fn name(&self) -> &'static str {
        match self {
            QuestionMode::None => "none",
            QuestionMode::TwoChoice => "two",
            QuestionMode::MultipleChoice => "multiple",
        }
    }
}

/// A question that can be started. Unlike `QuestionMode` there is no idle variant,
/// so a start command always names a real question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum QuestionKind {
    #[serde(rename = "two")]
    TwoChoice,
    #[serde(rename = "multiple")]
    MultipleChoice,
}

impl QuestionKind {
    /// Numeric code front ends expect in the start response
    pub fn code(&self) -> u8 {
        match self {
            QuestionKind::TwoChoice => 2,
            QuestionKind::MultipleChoice => 3,
        }
    }
}

impl From<QuestionKind> for QuestionMode {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::TwoChoice => QuestionMode::TwoChoice,
            QuestionKind::MultipleChoice => QuestionMode::MultipleChoice,
        }
    }
}

impl FromStr for QuestionKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two" => Ok(QuestionKind::TwoChoice),
            "multiple" => Ok(QuestionKind::MultipleChoice),
            other => Err(SessionError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Bad mode: {0}")]
    InvalidMode(String),

    #[error("No device at address {address} (devices 0..{device_count})")]
    AddressOutOfRange { address: i64, device_count: usize },

    #[error("Invalid value {0}, expected -1 to clear or 0-3")]
    InvalidValue(i64),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Where outbound commands go. Implemented by the link manager.
pub trait CommandSink: Send + Sync {
    fn send(&self, command: Command) -> Result<(), LinkError>;
}

/// What happened to an inbound vote
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Stored,
    AlreadyAnswered,
    InvalidValue,
    UnknownDevice,
}

/// Result of a direct slot write through the test seam
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectOutcome {
    /// The slot was unanswered before
    Created,
    /// The slot already held an answer
    Updated,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub mode: QuestionMode,
    pub answered: usize,
    pub devices: usize,
    pub slots: Vec<DeviceSlot>,
}

struct SessionState {
    mode: QuestionMode,
    registry: DeviceRegistry,
}

// ============================================================================
// Question Session
// ============================================================================

pub struct QuestionSession {
    state: Mutex<SessionState>,
    sink: Arc<dyn CommandSink>,
}

impl QuestionSession {
    pub fn new(device_count: usize, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                mode: QuestionMode::None,
                registry: DeviceRegistry::new(device_count),
            }),
            sink,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mode(&self) -> QuestionMode {
        self.lock_state().mode
    }

    /// Start a question. Unknown mode names fail before anything is sent.
    /// The round is reset between `Q0` and `Q1`, while remotes cannot vote.
    pub fn start(&self, mode_name: &str) -> Result<QuestionKind, SessionError> {
        let kind: QuestionKind = mode_name.parse()?;

        self.sink.send(Command::StopQuestion)?;
        {
            let mut state = self.lock_state();
            state.mode = kind.into();
            state.registry.reset_all();
        }
        self.sink.send(Command::StartQuestion(kind))?;

        info!("[question] Started {} question", QuestionMode::from(kind).name());
        Ok(kind)
    }

    /// Stop the current question and tally the answers. The mode is kept,
    /// so stopping twice tallies the same round twice.
    pub fn stop(&self) -> Result<Tally, SessionError> {
        self.sink.send(Command::StopQuestion)?;

        let state = self.lock_state();
        let tally = Tally::compute(state.mode, &state.registry);
        info!(
            "[question] Stopped {} question: {} answers counted from {} devices",
            state.mode.name(),
            tally.total(),
            state.registry.len()
        );

        Ok(tally)
    }

    /// Handle a vote decoded by the read loop. The first valid answer per
    /// round wins and is acknowledged so the remote lights its LED.
    pub fn on_frame_received(&self, address: i64, value: i64) -> Result<FrameOutcome, LinkError> {
        let ack = {
            let mut state = self.lock_state();

            let Some(addr) = state.registry.address(address) else {
                debug!("[question] Dropping vote from unknown device {}", address);
                return Ok(FrameOutcome::UnknownDevice);
            };

            if state.registry.answered(addr) {
                debug!("[question] Device {} already answered", addr);
                return Ok(FrameOutcome::AlreadyAnswered);
            }

            if !is_valid_value(value, state.mode) {
                return Ok(FrameOutcome::InvalidValue);
            }

            // is_valid_value admits 0..=3 at most
            let value = value as u8;
            state.registry.set(addr, value);
            debug!("[question] Device {} answered {}", addr, value);
            Command::Ack { address: addr, value }
        };

        self.sink.send(ack)?;
        Ok(FrameOutcome::Stored)
    }

    /// Write a slot directly, bypassing the link and mode validation.
    /// `-1` clears the slot.
    pub fn inject(&self, address: i64, value: i64) -> Result<InjectOutcome, SessionError> {
        let mut state = self.lock_state();

        let addr = state
            .registry
            .address(address)
            .ok_or(SessionError::AddressOutOfRange {
                address,
                device_count: state.registry.len(),
            })?;

        let outcome = if state.registry.answered(addr) {
            InjectOutcome::Updated
        } else {
            InjectOutcome::Created
        };

        match value {
            -1 => {
                state.registry.reset(addr);
            }
            0..=3 => {
                state.registry.set(addr, value as u8);
            }
            other => return Err(SessionError::InvalidValue(other)),
        }
        warn!("[question] Test injection: device {} set to {}", addr, value);

        Ok(outcome)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            mode: state.mode,
            answered: state.registry.answered_count(),
            devices: state.registry.len(),
            slots: state.registry.iter().copied().collect(),
        }
    }
}

impl FrameHandler for QuestionSession {
    fn on_frame(&self, frame: VoteFrame) {
        if let Err(e) = self.on_frame_received(frame.address, frame.value) {
            warn!("[question] Failed to acknowledge device {}: {}", frame.address, e);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
