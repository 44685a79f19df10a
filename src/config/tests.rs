use super::load::{default_config_path, default_log_path, default_playlist_dir, resolve_config_path};
use super::schema::*;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_cadence_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("CADENCE_CONFIG_PATH", "/tmp/cadence-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        PathBuf::from("/tmp/cadence-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    assert_eq!(
        default_config_path().unwrap(),
        PathBuf::from("/tmp/xdg-config-home")
            .join("cadence")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        default_config_path().unwrap(),
        PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("cadence")
            .join("config.toml")
    );
}

#[test]
fn default_log_path_uses_xdg_state_home_then_local_state() {
    let _lock = env_lock();
    {
        let _g1 = EnvGuard::set("XDG_STATE_HOME", "/tmp/xdg-state");
        assert_eq!(
            default_log_path().unwrap(),
            PathBuf::from("/tmp/xdg-state/cadence/cadence.log")
        );
    }

    let _g1 = EnvGuard::remove("XDG_STATE_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");
    assert_eq!(
        default_log_path().unwrap(),
        PathBuf::from("/tmp/home-dir/.local/state/cadence/cadence.log")
    );
}

#[test]
fn default_playlist_dir_uses_xdg_data_home_then_local_share() {
    let _lock = env_lock();
    {
        let _g1 = EnvGuard::set("XDG_DATA_HOME", "/tmp/xdg-data");
        assert_eq!(
            default_playlist_dir().unwrap(),
            PathBuf::from("/tmp/xdg-data/cadence/playlists")
        );
    }

    let _g1 = EnvGuard::remove("XDG_DATA_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");
    assert_eq!(
        default_playlist_dir().unwrap(),
        PathBuf::from("/tmp/home-dir/.local/share/cadence/playlists")
    );
}

#[test]
fn settings_load_from_config_file_and_parse_aliases() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[playback]
shuffle = true
loop_mode = "repeat-one"
volume = 80
autoload_queue = false

[audio]
crossfade_ms = 0
crossfade_steps = 3
quit_fade_out_ms = 123

[controls]
scrub_seconds = 9
volume_step = 10

[ui]
header_text = "hello"
now_playing_track_fields = ["artist", "title"]
now_playing_time_fields = ["elapsed", "remaining"]

[library]
root = "/srv/music"
extensions = ["mp3"]
recursive = false
display_fields = ["filename", "genre"]
display_separator = "::"

[playlists]
dir = "/srv/playlists"

[download]
extractor_path = "/opt/bin/yt-dlp"
ffmpeg_location = "/opt/ffmpeg/bin"
audio_format = "opus"
max_filename_len = 40

[logging]
level = "cadence=debug"
file = "/tmp/cadence-test.log"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("CADENCE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("CADENCE__AUDIO__CROSSFADE_MS");

    let s = Settings::load().unwrap();
    assert!(s.playback.shuffle);
    assert!(matches!(s.playback.loop_mode, LoopModeSetting::LoopOne));
    assert_eq!(s.playback.volume, 80);
    assert!(!s.playback.autoload_queue);
    assert_eq!(s.audio.crossfade_ms, 0);
    assert_eq!(s.audio.crossfade_steps, 3);
    assert_eq!(s.audio.quit_fade_out_ms, 123);
    assert_eq!(s.audio.position_interval_ms, 250);
    assert_eq!(s.controls.scrub_seconds, 9);
    assert_eq!(s.controls.volume_step, 10);
    assert_eq!(s.ui.header_text, "hello");
    assert!(matches!(s.ui.now_playing_track_fields[0], TrackDisplayField::Artist));
    assert!(matches!(s.ui.now_playing_time_fields[1], TimeField::Remaining));
    assert_eq!(s.library.root, Some(PathBuf::from("/srv/music")));
    assert_eq!(s.library.extensions, vec!["mp3".to_string()]);
    assert!(!s.library.recursive);
    assert_eq!(s.library.display_separator, "::");
    assert!(matches!(s.library.display_fields[0], TrackDisplayField::Filename));
    assert!(matches!(s.library.display_fields[1], TrackDisplayField::Genre));
    assert_eq!(s.playlists.dir, Some(PathBuf::from("/srv/playlists")));
    assert_eq!(s.download.extractor_path, Some(PathBuf::from("/opt/bin/yt-dlp")));
    assert_eq!(s.download.ffmpeg_location, Some(PathBuf::from("/opt/ffmpeg/bin")));
    assert_eq!(s.download.audio_format, "opus");
    assert_eq!(s.download.extractor_binary, "yt-dlp");
    assert_eq!(s.download.max_filename_len, 40);
    assert_eq!(s.logging.level, "cadence=debug");
    assert!(s.logging.enabled);
    assert!(s.validate().is_ok());
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[audio]
crossfade_ms = 250
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("CADENCE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("CADENCE__AUDIO__CROSSFADE_MS", "0");

    let s = Settings::load().unwrap();
    assert_eq!(s.audio.crossfade_ms, 0);
}

#[test]
fn missing_config_file_yields_defaults() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let _g1 = EnvGuard::set(
        "CADENCE_CONFIG_PATH",
        dir.path().join("absent.toml").to_str().unwrap(),
    );

    let s = Settings::load().unwrap();
    assert!(matches!(s.playback.loop_mode, LoopModeSetting::NoLoop));
    assert_eq!(s.playback.volume, 50);
    assert_eq!(s.download.audio_format, "mp3");
    assert_eq!(s.download.max_filename_len, 100);
    assert!(s.library.root.is_none());
}

#[test]
fn validate_rejects_out_of_range_values() {
    let mut s = Settings::default();
    assert!(s.validate().is_ok());

    s.audio.crossfade_steps = 0;
    assert!(s.validate().is_err());
    s.audio.crossfade_steps = 1;

    s.playback.volume = 101;
    assert!(s.validate().is_err());
    s.playback.volume = 100;

    s.download.audio_format = "  ".to_string();
    assert!(s.validate().is_err());
    s.download.audio_format = "mp3".to_string();

    s.download.max_filename_len = 4;
    assert!(s.validate().is_err());
}
