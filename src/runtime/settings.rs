use crate::config;

/// Load settings, falling back to defaults on any problem.
///
/// Config is optional, so a broken file must not keep the player from
/// starting. The second value carries the reason defaults were used; it is
/// reported once logging is up.
pub fn load_settings() -> (config::Settings, Option<String>) {
    match config::Settings::load() {
        Ok(s) => match s.validate() {
            Ok(()) => (s, None),
            Err(e) => (
                config::Settings::default(),
                Some(format!("{e}; using defaults")),
            ),
        },
        Err(e) => (
            config::Settings::default(),
            Some(format!("failed to load config, using defaults: {e}")),
        ),
    }
}
