//! Playback session state and the notifications the engine emits.

use std::time::Duration;

use crate::library::{EnrichedTrack, TrackRef};

/// Transport state derived from the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No current track.
    #[default]
    Idle,
    Playing,
    Paused,
}

/// The single active playback session.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    pub current: Option<TrackRef>,
    /// Ordered list governing next/previous.
    pub queue: Vec<TrackRef>,
    pub queue_position: usize,
    pub playing: bool,
    pub position: Duration,
    /// `None` until the decoder or the metadata reports it.
    pub duration: Option<Duration>,
    /// Display metadata of `current`, once enrichment finished.
    pub metadata: Option<EnrichedTrack>,
}

impl PlaybackSession {
    pub fn state(&self) -> PlaybackState {
        match (&self.current, self.playing) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Playing,
            (Some(_), false) => PlaybackState::Paused,
        }
    }

    /// Title to show for the current track: tags when known, else the file name.
    pub fn title(&self) -> Option<String> {
        match (&self.metadata, &self.current) {
            (Some(m), _) => Some(m.title.clone()),
            (None, Some(t)) => Some(t.fallback_title()),
            (None, None) => None,
        }
    }
}

/// State-change notification. Delivered to each subscriber in the order the
/// transitions happened, always after the state it describes is applied.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    TrackChanged(Option<TrackRef>),
    PlayingChanged(bool),
    QueueChanged { len: usize, position: usize },
    PositionChanged(Duration),
    DurationChanged(Option<Duration>),
    MetadataChanged(EnrichedTrack),
    /// A `play` could not bind its resource; the session is unchanged.
    LoadFailed { track: TrackRef, reason: String },
}
