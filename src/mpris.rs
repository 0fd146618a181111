//! MPRIS2 surface on the session bus.
//!
//! Methods never touch the engine: they forward a [`ControlCmd`] and the
//! runtime applies it. State shown to the bus is pushed in through
//! [`MprisHandle`].

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::object_server::InterfaceRef;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::audio::PlaybackState;
use crate::library::{EnrichedTrack, TrackRef};

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.haacchi";

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    /// No stopped state exists; treated as pause.
    Stop,
    Next,
    Prev,
    /// Relative offset in microseconds.
    SeekBy(i64),
    SetPosition(Duration),
}

pub type Forward = Arc<dyn Fn(ControlCmd) + Send + Sync>;

#[derive(Debug, Default)]
struct SharedState {
    playback: PlaybackState,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    position_micros: i64,
    track_id: Option<OwnedObjectPath>,
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

fn micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

fn track_path(track: &TrackRef) -> Option<OwnedObjectPath> {
    ObjectPath::try_from(format!("{OBJECT_PATH}/track/{}", track.id))
        .ok()
        .map(OwnedObjectPath::from)
}

impl MprisHandle {
    pub fn set_playback(&self, playback: PlaybackState) {
        if let Ok(mut s) = self.state.lock() {
            s.playback = playback;
        }
        let _ = self.notify.send(());
    }

    /// Show `track` with filename defaults until its tags are known.
    pub fn set_track(&self, track: Option<&TrackRef>) {
        let meta = track.map(EnrichedTrack::fallback);
        self.set_track_metadata(meta.as_ref());
    }

    pub fn set_track_metadata(&self, meta: Option<&EnrichedTrack>) {
        if let Ok(mut s) = self.state.lock() {
            match meta {
                Some(m) => {
                    s.title = Some(m.title.clone());
                    s.artist = vec![m.artist.clone()];
                    s.album = m.album.clone();
                    s.url = Some(m.track.url());
                    s.length_micros = m.duration.map(micros);
                    s.track_id = track_path(&m.track);
                }
                None => {
                    s.title = None;
                    s.artist.clear();
                    s.album = None;
                    s.url = None;
                    s.length_micros = None;
                    s.track_id = None;
                }
            }
        }
        let _ = self.notify.send(());
    }

    pub fn set_length(&self, length: Option<Duration>) {
        if let Ok(mut s) = self.state.lock() {
            s.length_micros = length.map(micros);
        }
        let _ = self.notify.send(());
    }

    /// Position is polled by clients; no change signal is sent.
    pub fn set_position(&self, position: Duration) {
        if let Ok(mut s) = self.state.lock() {
            s.position_micros = micros(position);
        }
    }
}

struct RootIface {
    forward: Forward,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {}

    fn quit(&self) {
        (self.forward)(ControlCmd::Quit);
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
        "haacchi"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec!["audio/mpeg".to_string()]
    }
}

struct PlayerIface {
    forward: Forward,
    state: Arc<Mutex<SharedState>>,
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        (self.forward)(ControlCmd::Next);
    }

    fn previous(&self) {
        (self.forward)(ControlCmd::Prev);
    }

    fn play(&self) {
        (self.forward)(ControlCmd::Play);
    }

    fn pause(&self) {
        (self.forward)(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        (self.forward)(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        (self.forward)(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        (self.forward)(ControlCmd::SeekBy(offset));
    }

    /// Ignored unless `track_id` names the current track.
    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        let current = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.track_id.clone());
        let matches = current.is_some_and(|c| c.as_str() == track_id.as_str());
        if !matches || position < 0 {
            debug!(%track_id, position, "ignoring SetPosition");
            return;
        }
        (self.forward)(ControlCmd::SetPosition(Duration::from_micros(
            position.unsigned_abs(),
        )));
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Idle => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state.lock().map_or(0, |s| s.position_micros)
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
    fn can_seek(&self) -> bool {
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

        if let Some(id) = &s.track_id {
            put("mpris:trackid", Value::from(id.clone()));
        }
        put("xesam:title", Value::from(s.title.clone().unwrap_or_default()));
        if !s.artist.is_empty() {
            put("xesam:artist", Value::from(s.artist.clone()));
        }
        if let Some(album) = &s.album {
            put("xesam:album", Value::from(album.clone()));
        }
        if let Some(url) = &s.url {
            put("xesam:url", Value::from(url.clone()));
        }
        if let Some(len) = s.length_micros {
            put("mpris:length", Value::from(len));
        }
        map
    }
}

async fn emit_changes(player: &InterfaceRef<PlayerIface>) {
    let iface = player.get().await;
    let emitter = player.signal_emitter();
    if let Err(e) = iface.playback_status_changed(emitter).await {
        debug!(error = %e, "PlaybackStatus signal failed");
    }
    if let Err(e) = iface.metadata_changed(emitter).await {
        debug!(error = %e, "Metadata signal failed");
    }
}

async fn serve(
    forward: Forward,
    state: Arc<Mutex<SharedState>>,
    notify: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server
        .at(
            OBJECT_PATH,
            RootIface {
                forward: Arc::clone(&forward),
            },
        )
        .await?;
    object_server
        .at(OBJECT_PATH, PlayerIface { forward, state })
        .await?;
    let player = object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await?;
    debug!(name = BUS_NAME, "mpris service registered");

    loop {
        Timer::after(Duration::from_millis(250)).await;
        let mut dirty = false;
        loop {
            match notify.try_recv() {
                Ok(()) => dirty = true,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if dirty {
            emit_changes(&player).await;
        }
    }
}

/// Start the bus service on its own thread. Bus failures are logged and
/// leave the handle working as a sink for state updates.
pub fn spawn_mpris(forward: Forward) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify, notify_rx) = mpsc::channel();

    let state_for_thread = Arc::clone(&state);
    let spawned = std::thread::Builder::new()
        .name("mpris".into())
        .spawn(move || {
            if let Err(e) = block_on(serve(forward, state_for_thread, notify_rx)) {
                warn!(error = %e, "MPRIS unavailable");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "could not start MPRIS thread");
    }

    MprisHandle { state, notify }
}

/// A handle whose updates go nowhere, used when MPRIS is disabled.
pub fn detached() -> MprisHandle {
    let (notify, _) = mpsc::channel();
    MprisHandle {
        state: Arc::new(Mutex::new(SharedState::default())),
        notify,
    }
}

#[cfg(test)]
mod tests;
