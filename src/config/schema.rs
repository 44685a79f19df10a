use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/cadence/config.toml` or `~/.config/cadence/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `CADENCE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub ui: UiSettings,
    pub controls: ControlsSettings,
    pub playback: PlaybackSettings,
    pub library: LibrarySettings,
    pub download: DownloadSettings,
    pub playlists: PlaylistSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Crossfade duration when switching tracks (milliseconds).
    /// Set to 0 to disable crossfade.
    pub crossfade_ms: u64,
    /// Number of steps used to fade volumes (higher = smoother, more CPU).
    pub crossfade_steps: u64,
    /// Fade-out duration when quitting (milliseconds).
    /// Set to 0 to stop immediately.
    pub quit_fade_out_ms: u64,
    /// How often the audio thread reports the playback position (milliseconds).
    pub position_interval_ms: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            crossfade_ms: 250,
            crossfade_steps: 10,
            quit_fade_out_ms: 500,
            position_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,

    /// Which track fields to show in the status "Song:" line, and in what order.
    ///
    /// Example: ["artist", "title", "album"]
    pub now_playing_track_fields: Vec<TrackDisplayField>,

    /// Separator used to join `now_playing_track_fields`.
    pub now_playing_track_separator: String,

    /// Which time fields to show for the status line, and in what order.
    ///
    /// Example: ["elapsed", "total", "remaining"]
    pub now_playing_time_fields: Vec<TimeField>,

    /// Separator used to join `now_playing_time_fields`.
    pub now_playing_time_separator: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ cadence ~ ".to_string(),
            now_playing_track_fields: vec![TrackDisplayField::Display],
            now_playing_track_separator: " - ".to_string(),
            now_playing_time_fields: vec![TimeField::Elapsed, TimeField::Total, TimeField::Remaining],
            now_playing_time_separator: " / ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
    /// Volume change (percent points) for `+` / `-`.
    pub volume_step: u8,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            scrub_seconds: 5,
            volume_step: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Whether the startup queue is shuffled.
    pub shuffle: bool,
    /// What happens when the last queued track ends.
    pub loop_mode: LoopModeSetting,
    /// Initial volume, 0-100.
    pub volume: u8,
    /// Enqueue the whole library at startup.
    pub autoload_queue: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            shuffle: false,
            loop_mode: LoopModeSetting::NoLoop,
            volume: 50,
            autoload_queue: true,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopModeSetting {
    #[serde(alias = "no_loop", alias = "normal")]
    NoLoop,
    #[serde(alias = "loopall", alias = "loop_all", alias = "repeat-all")]
    LoopAll,
    #[serde(alias = "loopone", alias = "loop_one", alias = "repeat-one")]
    LoopOne,
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeField {
    Elapsed,
    Total,
    Remaining,
}

#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    /// Use `track.display` (whatever the scanner produced).
    Display,
    Title,
    Artist,
    Album,
    Genre,
    Filename,
    Path,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Library root. The first CLI argument wins over this.
    pub root: Option<PathBuf>,
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,

    /// Which fields to use to build `Track.display` and its ordering.
    ///
    /// Example: ["artist", "title"] -> "Artist - Title"
    pub display_fields: Vec<TrackDisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            root: None,
            extensions: ["mp3", "flac", "wav", "ogg", "m4a", "opus"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            follow_links: true,
            include_hidden: false,
            recursive: true,
            max_depth: None,
            display_fields: vec![TrackDisplayField::Artist, TrackDisplayField::Title],
            display_separator: " - ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Extractor executable looked up on `PATH`.
    pub extractor_binary: String,
    /// Explicit extractor executable; skips the `PATH` lookup.
    pub extractor_path: Option<PathBuf>,
    /// Directory (or binary) handed to the extractor as `--ffmpeg-location`.
    pub ffmpeg_location: Option<PathBuf>,
    /// Container/extension of downloaded audio.
    pub audio_format: String,
    /// Extractor audio quality (0 = best).
    pub audio_quality: String,
    /// Longest filename stem written into the library.
    pub max_filename_len: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            extractor_binary: "yt-dlp".to_string(),
            extractor_path: None,
            ffmpeg_location: None,
            audio_format: "mp3".to_string(),
            audio_quality: "0".to_string(),
            max_filename_len: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaylistSettings {
    /// Where named playlists are stored, one TOML file each.
    /// Defaults to `$XDG_DATA_HOME/cadence/playlists`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `info` or `cadence::download=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Log file. Defaults to `$XDG_STATE_HOME/cadence/cadence.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            file: None,
        }
    }
}
