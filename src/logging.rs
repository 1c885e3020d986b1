// src/logging.rs
//
// tracing setup: compact console output plus an optional log file.
//
// Filter precedence: VOTELINK_LOG, then RUST_LOG, then `log_level` from settings.
// File logs go to `<log_dir>/<YYYYmmdd-HHMMSS>-votelink.log`, with a
// `votelink.log` symlink to the newest one (Unix only).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::settings::AppSettings;

const LOG_ENV: &str = "VOTELINK_LOG";
const LOG_NAME: &str = "votelink.log";

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Name of a new log file, e.g. `20240301-093015-votelink.log`
fn log_file_name() -> String {
    chrono::Local::now()
        .format(&format!("%Y%m%d-%H%M%S-{}", LOG_NAME))
        .to_string()
}

/// Create a fresh log file in `log_dir` and point the `votelink.log` symlink at it.
fn create_log_file(log_dir: &Path) -> anyhow::Result<(std::fs::File, PathBuf)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

    let filename = log_file_name();
    let log_path = log_dir.join(&filename);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

    // Windows symlinks need elevated privileges
    #[cfg(unix)]
    {
        let symlink_path = log_dir.join(LOG_NAME);
        let _ = std::fs::remove_file(&symlink_path);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &symlink_path) {
            eprintln!("[logging] Failed to create {} symlink: {}", LOG_NAME, e);
        }
    }

    Ok((file, log_path))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer; keep it alive until exit.
pub fn init_logging(settings: &AppSettings) -> anyhow::Result<Option<WorkerGuard>> {
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(build_filter(&settings.log_level))
        .with(console_layer);

    match &settings.log_dir {
        Some(log_dir) => {
            let (file, log_path) = create_log_file(log_dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let file_layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_line_number(true)
                .with_ansi(false);

            registry
                .with(file_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            tracing::info!("[logging] File logging started: {}", log_path.display());
            Ok(Some(guard))
        }
        None => {
            registry
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name_format() {
        let name = log_file_name();
        assert!(name.ends_with("-votelink.log"));
        // YYYYmmdd-HHMMSS-
        assert_eq!(name.len(), 16 + LOG_NAME.len());
        assert!(name[..8].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&name[8..9], "-");
    }

    #[test]
    fn test_create_log_file_makes_dir_and_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let (_file, log_path) = create_log_file(&log_dir).unwrap();

        assert!(log_path.exists());
        #[cfg(unix)]
        {
            let target = std::fs::read_link(log_dir.join(LOG_NAME)).unwrap();
            assert_eq!(target, PathBuf::from(log_path.file_name().unwrap()));
        }
    }

    #[test]
    fn test_filter_falls_back_to_configured_level() {
        if std::env::var_os(LOG_ENV).is_none() && std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(build_filter("debug").to_string(), "debug");
        }
    }
}
