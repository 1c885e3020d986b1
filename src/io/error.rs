// src/io/error.rs
//
// Typed errors for the serial link. Every variant names the device it came
// from so log lines stay readable when the adapter re-enumerates.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("{device}: connection failed: {message}")]
    Connection { device: String, message: String },

    #[error("{device}: read failed: {message}")]
    Read { device: String, message: String },

    #[error("{device}: write failed: {message}")]
    Write { device: String, message: String },

    #[error("{device}: protocol error: {message}")]
    Protocol { device: String, message: String },

    /// The shutdown hook fired while waiting on the link.
    #[error("link is shutting down")]
    Shutdown,
}

impl LinkError {
    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn read(device: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Read {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn write(device: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Write {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        LinkError::Protocol {
            device: device.into(),
            message: message.into(),
        }
    }
}
