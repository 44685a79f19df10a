//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`. Nothing
//! here mutates state; `draw` reads the view state, the controller, the
//! library and the download manager.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style, Stylize},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, Focus, InputMode};
use crate::audio::{MediaEngine, PlaybackController, PlaybackState};
use crate::config::{ControlsSettings, TimeField, UiSettings};
use crate::download::{DownloadJob, DownloadManager, JobStatus};
use crate::library::{LibraryIndex, Track, render_fields};

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("j/k", "up/down"),
        ("gg/G", "top/bottom"),
        ("tab", "switch pane"),
        ("enter", "play"),
        ("a/A", "enqueue/all"),
        ("d", "dequeue"),
        ("J/K", "move in queue"),
        ("space/p", "play/pause"),
        ("S", "stop"),
        ("zz", "go to playing"),
        ("C", "clear queue"),
        ("h/l", "prev/next"),
        // H/L is filled dynamically from config.
        ("+/-", "volume"),
        ("/", "filter"),
        ("s", "shuffle"),
        ("r", "loop mode"),
        ("R", "rescan"),
        ("y", "download"),
        ("Y", "download playlist"),
        ("x", "cancel download"),
        ("c", "clear downloads"),
        ("P/o", "save/load playlist"),
        ("O", "list playlists"),
        ("b", "add to playlist"),
        ("i", "metadata"),
        ("q", "quit"),
    ])
});

/// Render the controls help text, incorporating scrub seconds.
fn controls_text(scrub_seconds: u64) -> String {
    // Keep the rendered order stable and human-friendly.
    let order = [
        "j/k", "tab", "enter", "a/A", "d", "J/K", "C", "space/p", "S", "h/l", "H/L", "+/-",
        "gg/G", "zz", "/", "s", "r", "R", "y", "Y", "x", "c", "P/o", "O", "b", "i", "q",
    ];
    order
        .iter()
        .filter_map(|k| {
            if *k == "H/L" {
                Some(format!("[H/L] scrub -/+{scrub_seconds}s"))
            } else {
                CONTROLS_MAP.get(k).map(|v| format!("[{k}] {v}"))
            }
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
/// Total and remaining are left out while the duration is unknown.
fn now_playing_time_text(elapsed: Duration, total: Option<Duration>, ui: &UiSettings) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for f in &ui.now_playing_time_fields {
        match (f, total) {
            (TimeField::Elapsed, _) => parts.push(format_mmss(elapsed)),
            (TimeField::Total, Some(t)) => parts.push(format_mmss(t)),
            (TimeField::Remaining, Some(t)) => {
                parts.push(format!("-{}", format_mmss(t.saturating_sub(elapsed))))
            }
            _ => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(3);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Format a duration, rounding up partial seconds, showing total seconds.
/// Zero means the duration is unknown.
fn format_duration_mmss_ceil(d: Duration) -> String {
    if d.is_zero() {
        return "-".to_string();
    }

    let mut total_secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        total_secs = total_secs.saturating_add(1);
    }

    format!("{}:{:02} ({}s)", total_secs / 60, total_secs % 60, total_secs)
}

/// Uppercase the characters of `title` matched by the filter query.
fn highlight_matches(title: &str, query: &str) -> String {
    let Some(positions) = App::fuzzy_match_positions(title, query) else {
        return title.to_string();
    };

    let mut rendered = String::with_capacity(title.len());
    let mut pos_iter = positions.into_iter();
    let mut next_pos = pos_iter.next();
    for (ci, ch) in title.chars().enumerate() {
        if next_pos == Some(ci) {
            rendered.extend(ch.to_uppercase());
            next_pos = pos_iter.next();
        } else {
            rendered.push(ch);
        }
    }
    rendered
}

/// The slice `[start, end)` of a `total`-long list to show in `height` rows
/// so that `selected` stays centered when possible, plus its offset inside
/// that slice.
fn visible_window(total: usize, height: usize, selected: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected.min(total.saturating_sub(1)));
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let block = Block::default().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::default().add_modifier(Modifier::BOLD))
    } else {
        block.border_style(Style::default().add_modifier(Modifier::DIM))
    }
}

fn render_list(frame: &mut Frame, area: Rect, block: Block<'_>, rows: Vec<String>, selected: usize, focused: bool) {
    // Only build ListItems for the visible window.
    let height = area.height.saturating_sub(2) as usize;
    let total = rows.len();
    let (start, end, selected_in_window) = visible_window(total, height, selected);
    let items: Vec<ListItem> = rows
        .into_iter()
        .skip(start)
        .take(end - start)
        .map(ListItem::new)
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    if total > 0 && focused {
        state.select(Some(selected_in_window));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn status_text<E: MediaEngine>(
    app: &App,
    controller: &PlaybackController<E>,
    library: &LibraryIndex,
    downloads: &DownloadManager,
    ui: &UiSettings,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    match (controller.state(), controller.current_track()) {
        (PlaybackState::Stopped, _) | (_, None) => parts.push(" Stopped".to_string()),
        (state, Some(track)) => {
            let song = render_fields(
                track,
                &ui.now_playing_track_fields,
                &ui.now_playing_track_separator,
            );
            let total = track.has_known_duration().then_some(track.duration);
            match now_playing_time_text(controller.position(), total, ui) {
                Some(time) => parts.push(format!(" Song: {song} [{time}]")),
                None => parts.push(format!(" Song: {song}")),
            }
            let label = if state == PlaybackState::Playing { "Playing" } else { "Paused" };
            parts.push(label.to_string());
        }
    }

    parts.push(format!("VOL: {}%", controller.volume()));
    parts.push(format!("PLAYBACK: {}", controller.loop_mode().label()));

    let q = app.filter_query.trim();
    if app.input == InputMode::Filter || !q.is_empty() {
        parts.push(format!("FILTER: {q}").trim_end().to_string());
    }

    let active = downloads.active_count();
    if active > 0 {
        parts.push(format!("Downloading: {active}"));
    }

    parts.push(format!("Dir: {}", library.root().display()));

    if let Some(msg) = &app.status {
        parts.push(msg.clone());
    }

    parts.join(" • ")
}

fn queue_row(index: usize, track: &Track, cursor: Option<usize>) -> String {
    let marker = if cursor == Some(index) { "*" } else { " " };
    format!("{marker}{:>3}. {}", index + 1, track.display)
}

fn download_row(job: &DownloadJob) -> String {
    let what = job.filename.as_deref().unwrap_or(&job.url);
    match job.status {
        _ if job.is_cancelling() => format!("{} cancelling {what}", job.id),
        JobStatus::Running => {
            let item = match job.item {
                Some((index, count)) if job.playlist => format!(" [{index}/{count}]"),
                _ => String::new(),
            };
            format!("{} {} {:>3}%{item} {what}", job.id, job.status.label(), job.progress)
        }
        JobStatus::Succeeded if job.playlist => {
            format!("{} {} {} tracks from {what}", job.id, job.status.label(), job.tracks.len())
        }
        JobStatus::Succeeded => {
            let name = job
                .track()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{} {} {name}", job.id, job.status.label())
        }
        JobStatus::Failed => format!(
            "{} {} {what}: {}",
            job.id,
            job.status.label(),
            job.error.as_deref().unwrap_or("unknown error")
        ),
        JobStatus::Pending => format!("{} {} {what}", job.id, job.status.label()),
    }
}

fn metadata_text(track: Option<&Track>) -> String {
    let Some(track) = track else {
        return "No track selected".to_string();
    };
    format!(
        "Title: {}\nArtist: {}\nAlbum: {}\nGenre: {}\nDuration: {}\nAdded: {}\nPath: {}",
        track.title,
        track.artist.as_deref().unwrap_or("-"),
        track.album.as_deref().unwrap_or("-"),
        track.genre.as_deref().unwrap_or("-"),
        format_duration_mmss_ceil(track.duration),
        track.added_at.format("%Y-%m-%d %H:%M"),
        track.path.display()
    )
}

/// Render the entire UI into the provided `frame`.
pub fn draw<E: MediaEngine>(
    frame: &mut Frame,
    app: &App,
    controller: &PlaybackController<E>,
    library: &LibraryIndex,
    downloads: &DownloadManager,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" cadence ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status = status_text(app, controller, library, downloads, ui_settings);
    let status_par = Paragraph::new(status)
        .block(Block::bordered().padding(Padding::left(1)).title(" status "))
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(panes[1]);

    // Library
    {
        let tracks = library.tracks();
        let view = app.library_view(tracks);
        let q = app.filter_query.trim();
        let rows: Vec<String> = view
            .iter()
            .map(|&i| {
                let title = &tracks[i].display;
                if q.is_empty() {
                    title.clone()
                } else {
                    highlight_matches(title, q)
                }
            })
            .collect();
        let selected = view.iter().position(|&i| i == app.library_selected).unwrap_or(0);
        let focused = app.focus == Focus::Library;
        let title = format!(" library ({}/{}) ", view.len(), tracks.len());
        render_list(frame, panes[0], pane_block(title, focused), rows, selected, focused);
    }

    // Queue
    {
        let queue = controller.queue();
        let cursor = queue.cursor();
        let rows: Vec<String> = queue
            .entries()
            .iter()
            .enumerate()
            .map(|(i, t)| queue_row(i, t, cursor))
            .collect();
        let focused = app.focus == Focus::Queue;
        let title = format!(" queue ({}) ", queue.len());
        render_list(frame, right[0], pane_block(title, focused), rows, app.queue_selected, focused);
    }

    // Downloads
    {
        let rows: Vec<String> = downloads.jobs().iter().map(download_row).collect();
        let focused = app.focus == Focus::Downloads;
        let title = format!(" downloads ({} active) ", downloads.active_count());
        render_list(frame, right[1], pane_block(title, focused), rows, app.download_selected, focused);
    }

    // Overlay metadata popup (keeps the panes visible under it).
    if app.metadata_window {
        let track = match app.focus {
            Focus::Queue => controller.queue().get(app.queue_selected),
            _ => app.selected_library_track(library.tracks()),
        };
        let popup_area = centered_rect_sized(72, 9, chunks[2]);
        frame.render_widget(Clear, popup_area);
        let meta_paragraph = Paragraph::new(metadata_text(track))
            .block(
                Block::default()
                    .padding(Padding::left(1))
                    .borders(Borders::ALL)
                    .title(" metadata (i closes) "),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(meta_paragraph, popup_area);
    }

    if app.is_prompting() {
        let title = match &app.input {
            InputMode::Filename { .. } => " filename (enter = video title, esc cancels) ",
            InputMode::PlaylistUrl => " playlist URL (esc cancels) ",
            InputMode::SavePlaylist => " save queue as playlist (esc cancels) ",
            InputMode::LoadPlaylist => " load playlist (esc cancels) ",
            InputMode::AddToPlaylist { .. } => " add track to playlist (esc cancels) ",
            _ => " download URL (esc cancels) ",
        };
        let popup_area = centered_rect_sized(72, 3, chunks[2]);
        frame.render_widget(Clear, popup_area);
        let prompt = Paragraph::new(format!("{}_", app.prompt))
            .bold()
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(prompt, popup_area);
    }

    let footer = Paragraph::new(controls_text(controls_settings.scrub_seconds))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding::left(1)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmss_formatting() {
        assert_eq!(format_mmss(Duration::from_secs(0)), "00:00");
        assert_eq!(format_mmss(Duration::from_secs(125)), "02:05");
        assert_eq!(format_duration_mmss_ceil(Duration::from_millis(61_200)), "1:02 (62s)");
        assert_eq!(format_duration_mmss_ceil(Duration::ZERO), "-");
    }

    #[test]
    fn unknown_total_only_shows_elapsed() {
        let ui = UiSettings::default();
        let text = now_playing_time_text(Duration::from_secs(3), None, &ui);
        assert_eq!(text.as_deref(), Some("00:03"));
        let text = now_playing_time_text(Duration::from_secs(3), Some(Duration::from_secs(10)), &ui);
        assert_eq!(text.as_deref(), Some("00:03 / 00:10 / -00:07"));
    }

    #[test]
    fn window_keeps_selection_centered() {
        assert_eq!(visible_window(5, 10, 3), (0, 5, 3));
        assert_eq!(visible_window(100, 10, 50), (45, 55, 5));
        assert_eq!(visible_window(100, 10, 98), (90, 100, 8));
        assert_eq!(visible_window(0, 10, 0), (0, 0, 0));
    }

    #[test]
    fn metadata_shows_genre_or_a_dash() {
        let mut track = crate::audio::testing::track("song");
        assert!(metadata_text(Some(&track)).contains("Genre: -\n"));
        track.genre = Some("Dub".into());
        assert!(metadata_text(Some(&track)).contains("Genre: Dub\n"));
        assert_eq!(metadata_text(None), "No track selected");
    }

    #[test]
    fn matched_characters_are_uppercased() {
        assert_eq!(highlight_matches("hello world", "hw"), "Hello World");
        assert_eq!(highlight_matches("abc", "z"), "abc");
    }
}
