// src/cli.rs
//
// Command line flags. Anything set here overrides the settings file.

use clap::Parser;
use std::path::PathBuf;

use crate::settings::AppSettings;

#[derive(Parser, Debug, Default)]
#[command(name = "votelink")]
#[command(author, version, about = "Serial bridge for classroom voting remotes")]
#[command(long_about = r#"
Waits for the base station to be plugged in, collects button presses from the
remotes and serves question control and tallies over HTTP.

Settings are read from --config, or from the per-user config file
(~/.config/votelink/votelink.toml on Linux) when it exists.
"#)]
pub struct Cli {
    /// Path to the settings file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Serial device to open instead of scanning for one
    #[arg(long, value_name = "PATH")]
    pub device: Option<String>,

    /// HTTP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for log files
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// List serial ports and exit
    #[arg(long)]
    pub list_ports: bool,
}

impl Cli {
    pub fn apply(&self, settings: &mut AppSettings) {
        if let Some(device) = &self.device {
            settings.device_path = Some(device.clone());
        }
        if let Some(port) = self.port {
            settings.http_port = port;
        }
        if let Some(log_dir) = &self.log_dir {
            settings.log_dir = Some(log_dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::parse_from([
            "votelink",
            "--device",
            "/dev/ttyUSB1",
            "--port",
            "8080",
            "--log-dir",
            "/tmp/votelink",
        ]);
        let mut settings = AppSettings::default();

        cli.apply(&mut settings);

        assert_eq!(settings.device_path.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(settings.http_port, 8080);
        assert_eq!(settings.log_dir, Some(PathBuf::from("/tmp/votelink")));
    }

    #[test]
    fn test_no_flags_keeps_settings() {
        let cli = Cli::parse_from(["votelink"]);
        let mut settings = AppSettings::default();

        cli.apply(&mut settings);

        assert_eq!(settings.device_path, None);
        assert_eq!(settings.http_port, 3000);
        assert!(!cli.list_ports);
    }
}
