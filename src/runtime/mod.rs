use std::env;
use std::path::PathBuf;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::{App, Shell};
use crate::audio::{AudioPlayer, PlaybackController};
use crate::config::{Settings, default_playlist_dir};
use crate::download::{DownloadManager, Extractor, MissingExtractor, YtDlp};
use crate::error::Result;
use crate::library::LibraryIndex;
use crate::logging::init_logging;
use crate::mpris::{self, ControlCmd};
use crate::playlist::PlaylistStore;
use crate::queue::Queue;

mod event_loop;
mod mpris_sync;
mod settings;

/// Everything the primary thread owns while the player runs.
pub(crate) struct Player {
    pub controller: PlaybackController<AudioPlayer>,
    pub library: LibraryIndex,
    pub downloads: DownloadManager,
    pub playlists: PlaylistStore,
}

impl Player {
    pub fn shell(&mut self) -> Shell<'_, AudioPlayer> {
        Shell::new(
            &mut self.controller,
            &mut self.library,
            &mut self.downloads,
            &self.playlists,
        )
    }
}

pub fn run() -> Result<()> {
    let (settings, settings_warning) = settings::load_settings();

    match init_logging(&settings.logging) {
        Ok(Some(path)) => info!(log = %path.display(), "cadence starting"),
        Ok(None) => {}
        // Logging is best effort; the player works without it.
        Err(e) => eprintln!("cadence: {e}"),
    }

    let mut app = App::new();
    if let Some(msg) = settings_warning {
        warn!("{msg}");
        app.set_status(msg);
    }

    let root = library_root(&settings)?;
    let library = LibraryIndex::open(&root, settings.library.clone())?;
    info!(root = %root.display(), tracks = library.len(), "library loaded");

    let playlists = PlaylistStore::new(playlist_dir(&settings, &root));
    info!(dir = %playlists.dir().display(), "playlist store");

    let mut player = Player {
        controller: startup_controller(&settings, &library),
        downloads: DownloadManager::new(root, settings.download.clone(), locate_extractor(&settings)),
        library,
        playlists,
    };

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = mpris::spawn_mpris(control_tx);
    mpris_sync::update_mpris(&mpris, &player.controller);

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = event_loop::run(
        &mut terminal,
        &settings,
        &mut app,
        &mut player,
        &mpris,
        &control_rx,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    player
        .controller
        .engine()
        .quit_softly(Duration::from_millis(settings.audio.quit_fade_out_ms));
    info!("cadence stopped");

    run_result
}

/// First CLI argument, then `library.root`, then the working directory.
fn library_root(settings: &Settings) -> Result<PathBuf> {
    if let Some(arg) = env::args_os().nth(1) {
        return Ok(PathBuf::from(arg));
    }
    match &settings.library.root {
        Some(root) => Ok(root.clone()),
        None => Ok(env::current_dir()?),
    }
}

/// `playlists.dir`, then the XDG data dir, then a hidden dir in the library.
fn playlist_dir(settings: &Settings, root: &std::path::Path) -> PathBuf {
    settings
        .playlists
        .dir
        .clone()
        .or_else(default_playlist_dir)
        .unwrap_or_else(|| {
            warn!("no data directory; keeping playlists in the library root");
            root.join(".cadence-playlists")
        })
}

fn startup_controller(settings: &Settings, library: &LibraryIndex) -> PlaybackController<AudioPlayer> {
    let engine = AudioPlayer::new(settings.audio.clone());
    let queue = Queue::with_loop_mode(settings.playback.loop_mode.into());
    let mut controller = PlaybackController::new(engine, queue);
    controller.set_volume(settings.playback.volume);

    if settings.playback.autoload_queue {
        controller.enqueue_all(library.tracks().to_vec());
        if settings.playback.shuffle {
            controller.shuffle(&mut rand::rng());
        }
    }
    controller
}

/// A missing extractor only disables downloads; every job then fails with
/// the lookup error.
fn locate_extractor(settings: &Settings) -> Arc<dyn Extractor> {
    match YtDlp::locate(&settings.download) {
        Ok(ytdlp) => {
            info!(binary = %ytdlp.binary().display(), "extractor found");
            Arc::new(ytdlp)
        }
        Err(e) => {
            warn!(error = %e, "downloads disabled");
            Arc::new(MissingExtractor::new(e.to_string()))
        }
    }
}
