use std::{env, path::PathBuf};

use super::schema::Settings;
use crate::error::{Error, Result};

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `CADENCE__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("CADENCE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<()> {
        if self.audio.crossfade_steps == 0 {
            return Err(Error::InvalidConfig(
                "audio.crossfade_steps must be >= 1".to_string(),
            ));
        }
        if self.playback.volume > 100 {
            return Err(Error::InvalidConfig(
                "playback.volume must be within 0..=100".to_string(),
            ));
        }
        if self.download.audio_format.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "download.audio_format must not be empty".to_string(),
            ));
        }
        if self.download.max_filename_len < 8 {
            return Err(Error::InvalidConfig(
                "download.max_filename_len must be >= 8".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config path from `CADENCE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("CADENCE_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/cadence/config.toml`
/// or `~/.config/cadence/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    xdg_dir("XDG_CONFIG_HOME", ".config").map(|d| d.join("cadence").join("config.toml"))
}

/// Compute the default log file under `$XDG_STATE_HOME/cadence/cadence.log`
/// or `~/.local/state/cadence/cadence.log`.
pub fn default_log_path() -> Option<PathBuf> {
    xdg_dir("XDG_STATE_HOME", ".local/state").map(|d| d.join("cadence").join("cadence.log"))
}

/// Compute the default playlist directory under `$XDG_DATA_HOME/cadence/playlists`
/// or `~/.local/share/cadence/playlists`.
pub fn default_playlist_dir() -> Option<PathBuf> {
    xdg_dir("XDG_DATA_HOME", ".local/share").map(|d| d.join("cadence").join("playlists"))
}

fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    if let Some(xdg) = env::var_os(var) {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(home_fallback))
    }
}
