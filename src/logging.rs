//! File-backed `tracing` setup.
//!
//! The terminal belongs to the UI, so log lines go to a file instead of
//! stderr. `RUST_LOG` overrides the configured filter.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LoggingSettings, default_log_path};
use crate::error::{Error, Result};

/// Install the global subscriber. Returns the log file in use, or `None`
/// when logging is disabled.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<PathBuf>> {
    if !settings.enabled {
        return Ok(None);
    }

    let path = settings
        .file
        .clone()
        .or_else(default_log_path)
        .ok_or_else(|| Error::Logging("cannot determine a log file location".to_string()))?;
    let file = open_log_file(&path)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| Error::Logging(format!("bad level {:?}: {e}", settings.level)))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))?;

    Ok(Some(path))
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_logging_installs_nothing() {
        let settings = LoggingSettings {
            enabled: false,
            ..LoggingSettings::default()
        };
        assert_eq!(init_logging(&settings).unwrap(), None);
    }

    #[test]
    fn log_file_and_parent_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cadence.log");
        let file = open_log_file(&path).unwrap();
        drop(file);
        assert!(path.is_file());
    }
}
