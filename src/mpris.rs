//! Desktop media-key integration over the MPRIS D-Bus interface.
//!
//! The D-Bus service runs on its own thread. Method calls are turned into
//! `ControlCmd`s and posted to the primary thread; the primary thread pushes
//! playback state and metadata back through `MprisHandle`.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::app::Command;
use crate::audio::PlaybackState;
use crate::library::Track;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.cadence";
const NO_TRACK: &str = "/org/mpris/MediaPlayer2/TrackList/NoTrack";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
}

impl From<ControlCmd> for Command {
    fn from(cmd: ControlCmd) -> Self {
        match cmd {
            ControlCmd::Quit => Command::Quit,
            ControlCmd::Play => Command::Play,
            ControlCmd::Pause => Command::Pause,
            ControlCmd::PlayPause => Command::TogglePause,
            ControlCmd::Stop => Command::Stop,
            ControlCmd::Next => Command::Next,
            ControlCmd::Prev => Command::Previous,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct SharedState {
    playback: PlaybackState,
    track_id: Option<OwnedObjectPath>,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    genre: Vec<String>,
    url: Option<String>,
    length_micros: Option<i64>,
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl MprisHandle {
    pub fn set_playback(&self, playback: PlaybackState) {
        let changed = match self.state.lock() {
            Ok(mut s) if s.playback != playback => {
                s.playback = playback;
                true
            }
            _ => false,
        };
        if changed {
            let _ = self.notify.send(());
        }
    }

    /// Publish the queue entry at `index` as the current track, or clear it.
    pub fn set_track_metadata(&self, index: Option<usize>, track: Option<&Track>) {
        let next = SharedState {
            track_id: index.and_then(|i| {
                OwnedObjectPath::try_from(format!("{OBJECT_PATH}/track/{i}")).ok()
            }),
            title: track.map(|t| t.title.clone()),
            artist: track.and_then(|t| t.artist.clone()).into_iter().collect(),
            album: track.and_then(|t| t.album.clone()),
            genre: track.and_then(|t| t.genre.clone()).into_iter().collect(),
            url: track.map(|t| format!("file://{}", t.path.display())),
            length_micros: track
                .filter(|t| t.has_known_duration())
                .map(|t| t.duration.as_micros() as i64),
            playback: PlaybackState::default(),
        };

        let changed = match self.state.lock() {
            Ok(mut s) => {
                let next = SharedState {
                    playback: s.playback,
                    ..next
                };
                if *s != next {
                    *s = next;
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        };
        if changed {
            let _ = self.notify.send(());
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {}

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "cadence"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let mut put = |key: &str, value: Value<'_>| {
            if let Ok(v) = OwnedValue::try_from(value) {
                map.insert(key.to_string(), v);
            }
        };

        let track_id = match &s.track_id {
            Some(id) => id.clone().into_inner(),
            None => ObjectPath::from_static_str_unchecked(NO_TRACK),
        };
        put("mpris:trackid", Value::from(track_id));
        if let Some(title) = &s.title {
            put("xesam:title", Value::from(title.as_str()));
        }
        if !s.artist.is_empty() {
            put("xesam:artist", Value::from(s.artist.clone()));
        }
        if let Some(album) = &s.album {
            put("xesam:album", Value::from(album.as_str()));
        }
        if !s.genre.is_empty() {
            put("xesam:genre", Value::from(s.genre.clone()));
        }
        if let Some(url) = &s.url {
            put("xesam:url", Value::from(url.as_str()));
        }
        if let Some(len) = s.length_micros {
            put("mpris:length", Value::from(len));
        }
        map
    }
}

/// Start the MPRIS service. Failing to reach the session bus only disables it.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify, notify_rx) = mpsc::channel::<()>();

    let state_for_thread = state.clone();
    std::thread::spawn(move || {
        block_on(async move {
            if let Err(e) = serve(tx, state_for_thread, notify_rx).await {
                warn!(error = %e, "MPRIS disabled");
            }
        });
    });

    MprisHandle { state, notify }
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify_rx: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server
        .at(OBJECT_PATH, RootIface { tx: tx.clone() })
        .await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { tx, state })
        .await?;
    debug!(name = BUS_NAME, "MPRIS registered");

    let player = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;

    loop {
        Timer::after(Duration::from_millis(250)).await;

        let mut changed = false;
        loop {
            match notify_rx.try_recv() {
                Ok(()) => changed = true,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if changed {
            let iface = player.get().await;
            let emitter = player.signal_emitter();
            iface.playback_status_changed(emitter).await?;
            iface.metadata_changed(emitter).await?;
        }
    }
}
