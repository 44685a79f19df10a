use crate::config::TrackDisplayField;

use super::model::Track;

/// Join the requested `fields` of `track` with `sep`.
///
/// Blank fields are skipped. `Display` renders `track.display`, or
/// `artist - title` while the display string is still being built. Falls back
/// to the title when nothing was produced.
pub fn render_fields(track: &Track, fields: &[TrackDisplayField], sep: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut push = |v: Option<&str>| {
        if let Some(v) = v.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(v.to_string());
        }
    };

    for f in fields {
        match f {
            TrackDisplayField::Display => {
                if track.display.trim().is_empty() {
                    push(track.artist.as_deref());
                    push(Some(&track.title));
                } else {
                    push(Some(&track.display));
                }
            }
            TrackDisplayField::Title => push(Some(&track.title)),
            TrackDisplayField::Artist => push(track.artist.as_deref()),
            TrackDisplayField::Album => push(track.album.as_deref()),
            TrackDisplayField::Genre => push(track.genre.as_deref()),
            TrackDisplayField::Filename => push(track.path.file_stem().and_then(|s| s.to_str())),
            TrackDisplayField::Path => push(track.path.to_str()),
        }
    }

    if parts.is_empty() {
        track.title.clone()
    } else {
        parts.join(sep)
    }
}
