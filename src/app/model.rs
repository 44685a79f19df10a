//! View state for the terminal front end.
//!
//! `App` only holds what the UI needs between frames: which pane has focus,
//! the selections, the filter query and the text prompts. The library,
//! queue and playback state live in their own types and are passed in.

use std::path::PathBuf;

use crate::library::Track;

use super::command::Command;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Library,
    Queue,
    Downloads,
}

impl Focus {
    pub fn cycle(self) -> Self {
        match self {
            Self::Library => Self::Queue,
            Self::Queue => Self::Downloads,
            Self::Downloads => Self::Library,
        }
    }
}

/// What keystrokes currently mean.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    /// Typing a library filter.
    Filter,
    /// First download step: the URL.
    Url,
    /// Second download step: an optional filename for `url`.
    Filename { url: String },
    /// A playlist URL to fetch in full.
    PlaylistUrl,
    /// Name to save the queue under.
    SavePlaylist,
    /// Saved playlist to load into the queue.
    LoadPlaylist,
    /// Playlist to append `path` to.
    AddToPlaylist { path: PathBuf },
}

#[derive(Debug, Default)]
pub struct App {
    pub focus: Focus,
    /// Index into the library's track list.
    pub library_selected: usize,
    pub queue_selected: usize,
    pub download_selected: usize,
    pub input: InputMode,
    pub filter_query: String,
    /// Text typed into the active prompt.
    pub prompt: String,
    pub status: Option<String>,
    pub metadata_window: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    pub fn cycle_focus(&mut self) {
        self.focus = self.focus.cycle();
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    /// Indices of library tracks matching the filter, in library order.
    pub fn library_view(&self, tracks: &[Track]) -> Vec<usize> {
        let query = self.filter_query.trim();
        if query.is_empty() {
            return (0..tracks.len()).collect();
        }
        let query_lower = query.to_lowercase();
        tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                Self::fuzzy_match_positions(&t.display.to_lowercase(), &query_lower).is_some()
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn selected_library_track<'a>(&self, tracks: &'a [Track]) -> Option<&'a Track> {
        if self.library_view(tracks).contains(&self.library_selected) {
            tracks.get(self.library_selected)
        } else {
            None
        }
    }

    /// Fuzzy/subsequence match: return the character positions in `title`
    /// that match `query`, or `None` if not matched.
    pub fn fuzzy_match_positions(title: &str, query: &str) -> Option<Vec<usize>> {
        if query.is_empty() {
            return Some(Vec::new());
        }

        let mut positions: Vec<usize> = Vec::new();
        let mut title_iter = title.chars().enumerate();

        for qc in query.chars() {
            let qc_low = qc.to_ascii_lowercase();
            loop {
                match title_iter.next() {
                    Some((ti, tc)) if tc.to_ascii_lowercase() == qc_low => {
                        positions.push(ti);
                        break;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }

        Some(positions)
    }

    /// Move the selection of the focused pane down, wrapping at the end.
    pub fn select_next(&mut self, tracks: &[Track], queue_len: usize, downloads_len: usize) {
        match self.focus {
            Focus::Library => {
                let view = self.library_view(tracks);
                if view.is_empty() {
                    return;
                }
                self.library_selected = match view.iter().position(|&i| i == self.library_selected) {
                    Some(p) => view[(p + 1) % view.len()],
                    None => view[0],
                };
            }
            Focus::Queue => self.queue_selected = wrap_next(self.queue_selected, queue_len),
            Focus::Downloads => {
                self.download_selected = wrap_next(self.download_selected, downloads_len)
            }
        }
    }

    /// Move the selection of the focused pane up, wrapping at the start.
    pub fn select_prev(&mut self, tracks: &[Track], queue_len: usize, downloads_len: usize) {
        match self.focus {
            Focus::Library => {
                let view = self.library_view(tracks);
                if view.is_empty() {
                    return;
                }
                self.library_selected = match view.iter().position(|&i| i == self.library_selected) {
                    Some(0) | None => view[view.len() - 1],
                    Some(p) => view[p - 1],
                };
            }
            Focus::Queue => self.queue_selected = wrap_prev(self.queue_selected, queue_len),
            Focus::Downloads => {
                self.download_selected = wrap_prev(self.download_selected, downloads_len)
            }
        }
    }

    pub fn select_first(&mut self, tracks: &[Track]) {
        match self.focus {
            Focus::Library => {
                if let Some(&first) = self.library_view(tracks).first() {
                    self.library_selected = first;
                }
            }
            Focus::Queue => self.queue_selected = 0,
            Focus::Downloads => self.download_selected = 0,
        }
    }

    pub fn select_last(&mut self, tracks: &[Track], queue_len: usize, downloads_len: usize) {
        match self.focus {
            Focus::Library => {
                if let Some(&last) = self.library_view(tracks).last() {
                    self.library_selected = last;
                }
            }
            Focus::Queue => self.queue_selected = queue_len.saturating_sub(1),
            Focus::Downloads => self.download_selected = downloads_len.saturating_sub(1),
        }
    }

    /// Keep selections inside their lists after anything changed length.
    pub fn clamp_selections(&mut self, tracks: &[Track], queue_len: usize, downloads_len: usize) {
        self.queue_selected = self.queue_selected.min(queue_len.saturating_sub(1));
        self.download_selected = self.download_selected.min(downloads_len.saturating_sub(1));
        self.ensure_library_selection_visible(tracks);
    }

    pub fn enter_filter_mode(&mut self) {
        self.input = InputMode::Filter;
        self.focus = Focus::Library;
    }

    pub fn exit_filter_mode(&mut self) {
        self.input = InputMode::Normal;
    }

    pub fn clear_filter(&mut self, tracks: &[Track]) {
        self.filter_query.clear();
        self.input = InputMode::Normal;
        self.ensure_library_selection_visible(tracks);
    }

    pub fn push_filter_char(&mut self, c: char, tracks: &[Track]) {
        self.filter_query.push(c);
        self.ensure_library_selection_visible(tracks);
    }

    pub fn pop_filter_char(&mut self, tracks: &[Track]) {
        self.filter_query.pop();
        self.ensure_library_selection_visible(tracks);
    }

    /// Open the download prompt at the URL step.
    pub fn begin_download_prompt(&mut self) {
        self.prompt.clear();
        self.input = InputMode::Url;
    }

    pub fn begin_playlist_download_prompt(&mut self) {
        self.begin_prompt(InputMode::PlaylistUrl);
    }

    pub fn begin_save_playlist_prompt(&mut self) {
        self.begin_prompt(InputMode::SavePlaylist);
    }

    pub fn begin_load_playlist_prompt(&mut self) {
        self.begin_prompt(InputMode::LoadPlaylist);
    }

    pub fn begin_add_to_playlist_prompt(&mut self, path: PathBuf) {
        self.begin_prompt(InputMode::AddToPlaylist { path });
    }

    fn begin_prompt(&mut self, mode: InputMode) {
        self.prompt.clear();
        self.input = mode;
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt.clear();
        self.input = InputMode::Normal;
    }

    pub fn push_prompt_char(&mut self, c: char) {
        self.prompt.push(c);
    }

    pub fn pop_prompt_char(&mut self) {
        self.prompt.pop();
    }

    /// Confirm the current prompt step.
    ///
    /// The URL step moves on to the filename step (an empty URL closes the
    /// prompt). The filename step yields the download command; an empty
    /// filename means "use the video title". The single-step prompts yield
    /// their command directly and close on empty input.
    pub fn submit_prompt(&mut self) -> Option<Command> {
        let text = std::mem::take(&mut self.prompt).trim().to_string();
        match std::mem::take(&mut self.input) {
            InputMode::PlaylistUrl => (!text.is_empty()).then_some(Command::DownloadPlaylist(text)),
            InputMode::SavePlaylist => (!text.is_empty()).then_some(Command::SavePlaylist(text)),
            InputMode::LoadPlaylist => (!text.is_empty()).then_some(Command::LoadPlaylist(text)),
            InputMode::AddToPlaylist { path } => {
                (!text.is_empty()).then_some(Command::AddToPlaylist { name: text, path })
            }
            InputMode::Url => {
                if !text.is_empty() {
                    self.input = InputMode::Filename { url: text };
                }
                None
            }
            InputMode::Filename { url } => {
                let filename = Some(text).filter(|s| !s.is_empty());
                Some(Command::Download { url, filename })
            }
            other => {
                self.input = other;
                None
            }
        }
    }

    pub fn is_prompting(&self) -> bool {
        !matches!(self.input, InputMode::Normal | InputMode::Filter)
    }

    fn ensure_library_selection_visible(&mut self, tracks: &[Track]) {
        let view = self.library_view(tracks);
        match view.first() {
            None => self.library_selected = 0,
            Some(&first) if !view.contains(&self.library_selected) => {
                self.library_selected = first
            }
            Some(_) => {}
        }
    }
}

fn wrap_next(current: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (current + 1) % len }
}

fn wrap_prev(current: usize, len: usize) -> usize {
    match (current, len) {
        (_, 0) => 0,
        (0, len) => len - 1,
        (c, len) => (c - 1).min(len - 1),
    }
}
