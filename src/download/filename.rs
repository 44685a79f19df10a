//! Turning video titles and user input into library filenames.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|\x00-\x1f\x7f]"#).expect("valid regex"));

static SEPARATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*[-–—:]\s*(.*?)$").expect("valid regex"));

static TITLE_BY_ARTIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.*)\s+by\s+(.*)$").expect("valid regex"));

/// Name used when nothing usable is left of a title.
pub const FALLBACK_STEM: &str = "download";

/// Drop characters that are not safe in filenames on common platforms.
pub fn sanitize(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "").trim().to_string()
}

/// Reshape a video title into `Artist - Title` when it looks like one.
///
/// Titles already containing ` - ` are kept. Otherwise the first dash-like
/// or colon separator splits artist from title, and `Title by Artist` is
/// flipped around.
pub fn normalize_title(title: &str) -> String {
    let title = title.trim();
    if title.contains(" - ") {
        return title.to_string();
    }

    if let Some(caps) = SEPARATED.captures(title) {
        let (artist, song) = (caps[1].trim(), caps[2].trim());
        if !artist.is_empty() && !song.is_empty() {
            return format!("{artist} - {song}");
        }
    }

    if let Some(caps) = TITLE_BY_ARTIST.captures(title) {
        let (song, artist) = (caps[1].trim(), caps[2].trim());
        if !artist.is_empty() && !song.is_empty() {
            return format!("{artist} - {song}");
        }
    }

    title.to_string()
}

/// Cap `stem` at `max_len` characters, marking the cut with `...`.
pub fn truncate(stem: &str, max_len: usize) -> String {
    if stem.chars().count() <= max_len {
        return stem.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = stem.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// The final stem for a download: the user's filename if given, else the
/// normalised title.
pub fn library_stem(custom: Option<&str>, title: &str, audio_format: &str, max_len: usize) -> String {
    let stem = match custom.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => sanitize(strip_extension(name, audio_format)),
        None => sanitize(&normalize_title(title)),
    };
    let stem = truncate(&stem, max_len);
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}

/// `dir/stem.ext`, or `dir/stem (n).ext` for the first free `n`.
pub fn unique_destination(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}.{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{stem} ({n}).{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn strip_extension<'a>(name: &'a str, ext: &str) -> &'a str {
    let suffix_len = ext.len() + 1;
    if name.len() > suffix_len
        && name.is_char_boundary(name.len() - suffix_len)
        && name[name.len() - suffix_len..].eq_ignore_ascii_case(&format!(".{ext}"))
    {
        &name[..name.len() - suffix_len]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn sanitize_strips_reserved_and_control_characters() {
        assert_eq!(sanitize(r#"  AC/DC: "Live" <at> Donington?* |\ "#), "ACDC Live at Donington");
        assert_eq!(sanitize("tab\there"), "tabhere");
    }

    #[test]
    fn normalize_title_recognises_common_shapes() {
        assert_eq!(normalize_title("Daft Punk - Around the World"), "Daft Punk - Around the World");
        assert_eq!(normalize_title("Daft Punk – Around the World"), "Daft Punk - Around the World");
        assert_eq!(normalize_title("Daft Punk: Around the World"), "Daft Punk - Around the World");
        assert_eq!(normalize_title("Around the World by Daft Punk"), "Daft Punk - Around the World");
        assert_eq!(normalize_title("Around the World"), "Around the World");
        assert_eq!(normalize_title("- Intro"), "- Intro");
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 10), "abcdefg...");
        assert_eq!(truncate("ééééééééééé", 10).chars().count(), 10);
    }

    #[test]
    fn library_stem_prefers_custom_name() {
        assert_eq!(library_stem(Some("My Mix.mp3"), "ignored", "mp3", 100), "My Mix");
        assert_eq!(library_stem(Some("  "), "A: B", "mp3", 100), "A - B");
        assert_eq!(library_stem(None, "???", "mp3", 100), FALLBACK_STEM);
    }

    #[test]
    fn unique_destination_appends_counter() {
        let dir = tempdir().unwrap();
        assert_eq!(unique_destination(dir.path(), "song", "mp3"), dir.path().join("song.mp3"));

        fs::write(dir.path().join("song.mp3"), b"x").unwrap();
        fs::write(dir.path().join("song (1).mp3"), b"x").unwrap();
        assert_eq!(unique_destination(dir.path(), "song", "mp3"), dir.path().join("song (2).mp3"));
    }
}
