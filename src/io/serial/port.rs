// src/io/serial/port.rs
//
// Port opening behind a trait so the link manager can run against the real
// serialport backend or an in-memory stand-in.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use super::utils::{
    find_device, platform_device_pattern, to_serialport_data_bits, to_serialport_parity,
    to_serialport_stop_bits, Parity,
};
use crate::io::error::LinkError;
use crate::settings::AppSettings;

/// A bidirectional byte stream to the base station.
///
/// `try_clone_stream` must hand out a second handle to the same device so the
/// read loop and writers can use the port independently.
pub trait SerialStream: Read + Write + Send {
    fn try_clone_stream(&self) -> std::io::Result<Box<dyn SerialStream>>;
}

/// Finds and opens the base station.
pub trait Connector: Send + Sync {
    /// Path of the device to open, or None when nothing is plugged in.
    fn discover(&self) -> Option<String>;

    fn connect(&self, path: &str) -> Result<Box<dyn SerialStream>, LinkError>;
}

// ============================================================================
// serialport backend
// ============================================================================

/// Serial port configuration
#[derive(Clone, Debug)]
pub struct SerialConfig {
    pub device_dir: PathBuf,
    pub device_path: Option<String>,
    pub device_pattern: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Read timeout; bounds how long the read loop waits before checking for shutdown
    pub read_timeout: Duration,
}

impl From<&AppSettings> for SerialConfig {
    fn from(settings: &AppSettings) -> Self {
        SerialConfig {
            device_dir: settings.device_dir.clone(),
            device_path: settings.device_path.clone(),
            device_pattern: settings.device_pattern.clone(),
            baud_rate: settings.baud_rate,
            data_bits: settings.data_bits,
            stop_bits: settings.stop_bits,
            parity: settings.parity.clone(),
            read_timeout: settings.read_timeout(),
        }
    }
}

/// Opens the base station through the serialport crate
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl Connector for SerialConnector {
    fn discover(&self) -> Option<String> {
        if let Some(path) = &self.config.device_path {
            return Some(path.clone());
        }

        let pattern = match self.config.device_pattern.as_deref().or_else(|| platform_device_pattern()) {
            Some(p) => p,
            None => {
                tracing::warn!(
                    "[serial] Unknown operating system {}, set device_path or device_pattern",
                    std::env::consts::OS
                );
                return None;
            }
        };

        find_device(&self.config.device_dir, pattern)
    }

    fn connect(&self, path: &str) -> Result<Box<dyn SerialStream>, LinkError> {
        let port = serialport::new(path, self.config.baud_rate)
            .data_bits(to_serialport_data_bits(self.config.data_bits))
            .stop_bits(to_serialport_stop_bits(self.config.stop_bits))
            .parity(to_serialport_parity(&self.config.parity))
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|e| LinkError::connection(path, e.to_string()))?;

        Ok(Box::new(PortStream(port)))
    }
}

struct PortStream(Box<dyn serialport::SerialPort>);

impl Read for PortStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for PortStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl SerialStream for PortStream {
    fn try_clone_stream(&self) -> std::io::Result<Box<dyn SerialStream>> {
        let port = self.0.try_clone().map_err(std::io::Error::from)?;
        Ok(Box::new(PortStream(port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(dir: PathBuf) -> SerialConfig {
        let mut settings = AppSettings::default();
        settings.device_dir = dir;
        SerialConfig::from(&settings)
    }

    #[test]
    fn test_explicit_path_skips_discovery() {
        let mut config = config_for(PathBuf::from("/nonexistent"));
        config.device_path = Some("/dev/ttyUSB7".to_string());

        let connector = SerialConnector::new(config);
        assert_eq!(connector.discover().as_deref(), Some("/dev/ttyUSB7"));
    }

    #[test]
    fn test_custom_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ttyUSB0"), b"").unwrap();
        std::fs::write(dir.path().join("ttyS0"), b"").unwrap();

        let mut config = config_for(dir.path().to_path_buf());
        config.device_pattern = Some("USB".to_string());

        let connector = SerialConnector::new(config);
        assert_eq!(
            connector.discover(),
            Some(dir.path().join("ttyUSB0").to_string_lossy().to_string())
        );
    }

    #[test]
    fn test_connect_missing_device_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SerialConnector::new(config_for(dir.path().to_path_buf()));
        let path = dir.path().join("ttyACM9");

        let err = connector.connect(&path.to_string_lossy()).err().unwrap();
        assert!(matches!(err, LinkError::Connection { .. }));
    }
}
