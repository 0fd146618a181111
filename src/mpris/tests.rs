use super::*;
use std::time::Duration;

use crate::library::TrackRef;

fn make_meta() -> EnrichedTrack {
    let track = TrackRef::new("/tmp/music/test.mp3", 10);
    let mut m = EnrichedTrack::fallback(&track);
    m.title = "Test Title".to_string();
    m.artist = "Test Artist".to_string();
    m.album = Some("Test Album".to_string());
    m.duration = Some(Duration::from_micros(1_234_567));
    m
}

fn recording() -> (Forward, mpsc::Receiver<ControlCmd>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let forward: Forward = Arc::new(move |cmd| {
        let _ = tx.lock().unwrap().send(cmd);
    });
    (forward, rx)
}

fn player() -> (PlayerIface, Arc<Mutex<SharedState>>, mpsc::Receiver<ControlCmd>) {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (forward, rx) = recording();
    let iface = PlayerIface {
        forward,
        state: state.clone(),
    };
    (iface, state, rx)
}

#[test]
fn set_track_metadata_sets_and_clears_shared_state() {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify, notify_rx) = mpsc::channel::<()>();
    let handle = MprisHandle {
        state: state.clone(),
        notify,
    };

    let meta = make_meta();
    handle.set_track_metadata(Some(&meta));

    {
        let s = state.lock().unwrap();
        assert_eq!(s.title.as_deref(), Some("Test Title"));
        assert_eq!(s.artist, vec!["Test Artist".to_string()]);
        assert_eq!(s.album.as_deref(), Some("Test Album"));
        assert_eq!(s.url.as_deref(), Some("file:///tmp/music/test.mp3"));
        assert_eq!(s.length_micros, Some(1_234_567));
        let expected = format!("/org/mpris/MediaPlayer2/track/{}", meta.track.id);
        assert_eq!(s.track_id.as_ref().map(|p| p.as_str()), Some(expected.as_str()));
    }

    handle.set_track_metadata(None);
    {
        let s = state.lock().unwrap();
        assert_eq!(s.title, None);
        assert!(s.artist.is_empty());
        assert_eq!(s.album, None);
        assert_eq!(s.url, None);
        assert_eq!(s.length_micros, None);
        assert!(s.track_id.is_none());
    }

    assert_eq!(notify_rx.try_iter().count(), 2);
}

#[test]
fn set_track_uses_filename_defaults() {
    let handle = detached();
    handle.set_track(Some(&TrackRef::new("/music/Intro.mp3", 1)));

    let s = handle.state.lock().unwrap();
    assert_eq!(s.title.as_deref(), Some("Intro"));
    assert_eq!(s.artist, vec![crate::library::UNKNOWN_ARTIST.to_string()]);
    assert_eq!(s.length_micros, None);
}

#[test]
fn playback_status_maps_state_to_mpris_strings() {
    let (iface, state, _rx) = player();

    state.lock().unwrap().playback = PlaybackState::Idle;
    assert_eq!(iface.playback_status(), "Stopped");

    state.lock().unwrap().playback = PlaybackState::Playing;
    assert_eq!(iface.playback_status(), "Playing");

    state.lock().unwrap().playback = PlaybackState::Paused;
    assert_eq!(iface.playback_status(), "Paused");
}

#[test]
fn metadata_includes_expected_keys_when_present() {
    let (iface, state, _rx) = player();
    let handle = MprisHandle {
        state: state.clone(),
        notify: mpsc::channel().0,
    };
    handle.set_track_metadata(Some(&make_meta()));

    let map = iface.metadata();
    for k in [
        "mpris:trackid",
        "xesam:title",
        "xesam:artist",
        "xesam:album",
        "xesam:url",
        "mpris:length",
    ] {
        assert!(map.contains_key(k), "missing key: {k}");
    }
}

#[test]
fn metadata_without_track_only_has_empty_title() {
    let (iface, _state, _rx) = player();
    let map = iface.metadata();
    assert_eq!(map.len(), 1);
    assert!(map.contains_key("xesam:title"));
}

#[test]
fn methods_forward_control_commands() {
    let (iface, _state, rx) = player();

    iface.play();
    iface.pause();
    iface.play_pause();
    iface.stop();
    iface.next();
    iface.previous();
    iface.seek(-5_000_000);

    let got: Vec<ControlCmd> = rx.try_iter().collect();
    assert_eq!(
        got,
        vec![
            ControlCmd::Play,
            ControlCmd::Pause,
            ControlCmd::PlayPause,
            ControlCmd::Stop,
            ControlCmd::Next,
            ControlCmd::Prev,
            ControlCmd::SeekBy(-5_000_000),
        ]
    );
}

#[test]
fn set_position_requires_the_current_track_id() {
    let (iface, state, rx) = player();
    let meta = make_meta();
    let handle = MprisHandle {
        state: state.clone(),
        notify: mpsc::channel().0,
    };
    handle.set_track_metadata(Some(&meta));
    let current = format!("/org/mpris/MediaPlayer2/track/{}", meta.track.id);

    iface.set_position(ObjectPath::try_from("/org/mpris/MediaPlayer2/track/other").unwrap(), 1_000_000);
    iface.set_position(ObjectPath::try_from(current.as_str()).unwrap(), -1);
    iface.set_position(ObjectPath::try_from(current.as_str()).unwrap(), 2_000_000);

    let got: Vec<ControlCmd> = rx.try_iter().collect();
    assert_eq!(got, vec![ControlCmd::SetPosition(Duration::from_secs(2))]);
}

#[test]
fn position_is_reported_in_micros() {
    let (iface, state, _rx) = player();
    let handle = MprisHandle {
        state,
        notify: mpsc::channel().0,
    };
    handle.set_position(Duration::from_millis(1500));
    assert_eq!(iface.position(), 1_500_000);
}
