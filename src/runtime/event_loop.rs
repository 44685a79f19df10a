use std::io::Stdout;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::{App, Command, Focus, InputMode, Outcome};
use crate::config;
use crate::download::JobStatus;
use crate::error::Result;
use crate::mpris::{ControlCmd, MprisHandle};
use crate::runtime::Player;
use crate::runtime::mpris_sync::update_mpris;
use crate::ui;

/// Two-key prefixes (`gg`, `zz`) pending across key presses.
#[derive(Debug, Default)]
struct KeyState {
    pending_g: bool,
    pending_z: bool,
}

impl KeyState {
    fn reset(&mut self) {
        self.pending_g = false;
        self.pending_z = false;
    }
}

/// Main terminal event loop: drains engine and download notifications,
/// draws, then handles MPRIS and keyboard input. Returns when a `Quit`
/// command was dispatched.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    player: &mut Player,
    mpris: &MprisHandle,
    control_rx: &Receiver<ControlCmd>,
) -> Result<()> {
    let mut keys = KeyState::default();

    loop {
        for msg in player.shell().poll() {
            info!(%msg, "notification");
            app.set_status(msg);
        }
        app.clamp_selections(
            player.library.tracks(),
            player.controller.queue().len(),
            player.downloads.jobs().len(),
        );

        // Media keys and auto-advance change state outside of key handling.
        update_mpris(mpris, &player.controller);

        terminal.draw(|f| {
            ui::draw(
                f,
                app,
                &player.controller,
                &player.library,
                &player.downloads,
                &settings.ui,
                &settings.controls,
            )
        })?;

        while let Ok(cmd) = control_rx.try_recv() {
            if execute(app, player, cmd.into()) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(cmd) = handle_key_event(key, settings, app, player, &mut keys) {
                    if execute(app, player, cmd) {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Dispatch `cmd` and report the outcome in the status line. Returns
/// `true` on quit.
fn execute(app: &mut App, player: &mut Player, cmd: Command) -> bool {
    match player.shell().dispatch(cmd) {
        Ok(Outcome::Quit) => true,
        Ok(Outcome::Message(msg)) => {
            app.set_status(msg);
            false
        }
        Ok(Outcome::Done) => false,
        Err(e) => {
            warn!(error = %e, "command failed");
            app.set_status(e.to_string());
            false
        }
    }
}

fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    player: &Player,
    keys: &mut KeyState,
) -> Option<Command> {
    match app.input {
        InputMode::Filter => {
            keys.reset();
            handle_filter_key(key, app, player)
        }
        InputMode::Normal => handle_normal_key(key, settings, app, player, keys),
        _ => {
            keys.reset();
            handle_prompt_key(key, app)
        }
    }
}

fn handle_filter_key(key: KeyEvent, app: &mut App, player: &Player) -> Option<Command> {
    let tracks = player.library.tracks();
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let (queue_len, downloads_len) = (player.controller.queue().len(), player.downloads.jobs().len());

    match key.code {
        KeyCode::Esc => app.clear_filter(tracks),
        KeyCode::Backspace => app.pop_filter_char(tracks),
        KeyCode::Char('j' | 'n') if ctrl => app.select_next(tracks, queue_len, downloads_len),
        KeyCode::Char('k' | 'p') if ctrl => app.select_prev(tracks, queue_len, downloads_len),
        KeyCode::Char(c) if !c.is_control() => app.push_filter_char(c, tracks),
        KeyCode::Enter => {
            let track = app.selected_library_track(tracks)?;
            let path = track.path.clone();
            app.exit_filter_mode();
            return Some(Command::PlayTrack(path));
        }
        _ => {}
    }
    None
}

fn handle_prompt_key(key: KeyEvent, app: &mut App) -> Option<Command> {
    match key.code {
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Backspace => app.pop_prompt_char(),
        KeyCode::Enter => return app.submit_prompt(),
        KeyCode::Char(c) if !c.is_control() => app.push_prompt_char(c),
        _ => {}
    }
    None
}

fn handle_normal_key(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    player: &Player,
    keys: &mut KeyState,
) -> Option<Command> {
    let tracks = player.library.tracks();
    let queue = player.controller.queue();
    let jobs = player.downloads.jobs();

    // `g` and `z` only mean something as the second half of a pair.
    match key.code {
        KeyCode::Char('g') => {
            if std::mem::take(&mut keys.pending_g) {
                app.select_first(tracks);
            } else {
                keys.pending_g = true;
            }
            keys.pending_z = false;
            return None;
        }
        KeyCode::Char('z') => {
            // zz: jump to the playing queue entry.
            if std::mem::take(&mut keys.pending_z) {
                if let Some(cursor) = queue.cursor() {
                    app.focus = Focus::Queue;
                    app.queue_selected = cursor;
                }
            } else {
                keys.pending_z = true;
            }
            keys.pending_g = false;
            return None;
        }
        _ => keys.reset(),
    }

    let scrub = settings.controls.scrub_seconds.min(i64::MAX as u64) as i64;
    let step = i16::from(settings.controls.volume_step);

    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Tab => {
            app.cycle_focus();
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next(tracks, queue.len(), jobs.len());
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_prev(tracks, queue.len(), jobs.len());
            None
        }
        KeyCode::Char('G') => {
            app.select_last(tracks, queue.len(), jobs.len());
            None
        }
        KeyCode::Enter => match app.focus {
            Focus::Library => app
                .selected_library_track(tracks)
                .map(|t| Command::PlayTrack(t.path.clone())),
            Focus::Queue => (!queue.is_empty()).then_some(Command::PlayQueueEntry(app.queue_selected)),
            Focus::Downloads => jobs
                .get(app.download_selected)
                .filter(|j| j.status == JobStatus::Succeeded)
                .and_then(|j| j.track().map(Path::to_path_buf))
                .map(Command::PlayTrack),
        },
        KeyCode::Char('a') if app.focus == Focus::Library => app
            .selected_library_track(tracks)
            .map(|t| Command::Enqueue(t.path.clone())),
        KeyCode::Char('A') => Some(Command::EnqueueAll),
        KeyCode::Char('d' | 'x') if app.focus == Focus::Queue && !queue.is_empty() => {
            Some(Command::Remove(app.queue_selected))
        }
        KeyCode::Char('x') if app.focus == Focus::Downloads => jobs
            .get(app.download_selected)
            .filter(|j| !j.is_terminal())
            .map(|j| Command::CancelDownload(j.id)),
        KeyCode::Char('b') if app.focus == Focus::Library => {
            if let Some(t) = app.selected_library_track(tracks) {
                let path = t.path.clone();
                app.begin_add_to_playlist_prompt(path);
            }
            None
        }
        KeyCode::Char('J') if app.focus == Focus::Queue && app.queue_selected + 1 < queue.len() => {
            let from = app.queue_selected;
            app.queue_selected += 1;
            Some(Command::Reorder { from, to: from + 1 })
        }
        KeyCode::Char('K') if app.focus == Focus::Queue && app.queue_selected > 0 && !queue.is_empty() => {
            let from = app.queue_selected;
            app.queue_selected -= 1;
            Some(Command::Reorder { from, to: from - 1 })
        }
        KeyCode::Char('C') => Some(Command::ClearQueue),
        KeyCode::Char('p' | ' ') => Some(Command::TogglePause),
        KeyCode::Char('S') => Some(Command::Stop),
        KeyCode::Char('l') => Some(Command::Next),
        KeyCode::Char('h') => Some(Command::Previous),
        KeyCode::Char('L') => Some(Command::SeekBy(scrub)),
        KeyCode::Char('H') => Some(Command::SeekBy(-scrub)),
        KeyCode::Char('+' | '=') => Some(Command::AdjustVolume(step)),
        KeyCode::Char('-') => Some(Command::AdjustVolume(-step)),
        KeyCode::Char('s') => Some(Command::Shuffle),
        KeyCode::Char('r') => Some(Command::CycleLoopMode),
        KeyCode::Char('R') => Some(Command::Rescan),
        KeyCode::Char('y') => {
            app.begin_download_prompt();
            None
        }
        KeyCode::Char('Y') => {
            app.begin_playlist_download_prompt();
            None
        }
        KeyCode::Char('c') => Some(Command::ClearFinishedDownloads),
        KeyCode::Char('P') => {
            app.begin_save_playlist_prompt();
            None
        }
        KeyCode::Char('o') => {
            app.begin_load_playlist_prompt();
            None
        }
        KeyCode::Char('O') => Some(Command::ListPlaylists),
        KeyCode::Char('i') => {
            app.toggle_metadata_window();
            None
        }
        KeyCode::Char('/') => {
            app.enter_filter_mode();
            None
        }
        _ => None,
    }
}
