use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::io::serial::Parity;

/// Highest device count addressable with one-byte device addresses.
pub const MAX_DEVICE_COUNT: usize = 256;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppSettings {
    /// Directory scanned for the base station's device file
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,
    /// Explicit device path; skips discovery when set
    #[serde(default)]
    pub device_path: Option<String>,
    /// Device file name fragment; defaults to the platform pattern
    #[serde(default)]
    pub device_pattern: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Number of voting remotes, addressed 0..device_count
    #[serde(default = "default_device_count")]
    pub device_count: usize,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Longest inbound line accepted before the framer force-splits it
    #[serde(default = "default_max_frame_length")]
    pub max_frame_length: usize,

    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Reports directory for file logging (None = console only)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_device_dir() -> PathBuf {
    PathBuf::from("/dev")
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_device_count() -> usize {
    10
}
fn default_reconnect_interval_ms() -> u64 {
    2000
}
fn default_max_frame_length() -> usize {
    256
}
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    3000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            device_path: None,
            device_pattern: None,
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            read_timeout_ms: default_read_timeout_ms(),
            device_count: default_device_count(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_frame_length: default_max_frame_length(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the per-user config file when no
    /// path is given. A missing per-user file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let (settings_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_settings_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !settings_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&settings_path).map_err(|source| SettingsError::Read {
            path: settings_path.clone(),
            source,
        })?;

        let settings = Self::from_toml(&content).map_err(|e| match e {
            SettingsError::Parse { source, .. } => SettingsError::Parse {
                path: settings_path.clone(),
                source,
            },
            other => other,
        })?;

        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: AppSettings = toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.device_count == 0 || self.device_count > MAX_DEVICE_COUNT {
            return Err(SettingsError::Invalid {
                field: "device_count",
                reason: format!("must be between 1 and {}, got {}", MAX_DEVICE_COUNT, self.device_count),
            });
        }
        if self.baud_rate == 0 {
            return Err(SettingsError::Invalid {
                field: "baud_rate",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.max_frame_length == 0 {
            return Err(SettingsError::Invalid {
                field: "max_frame_length",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

/// `<config dir>/votelink/votelink.toml`, e.g. `~/.config/votelink/votelink.toml` on Linux
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("votelink").join("votelink.toml"))
}
