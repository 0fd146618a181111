use crate::audio::{PlaybackEvent, PlaybackSession};
use crate::mpris::MprisHandle;

/// Push one engine event into the MPRIS view. `session` already reflects it.
pub fn apply(mpris: &MprisHandle, event: &PlaybackEvent, session: &PlaybackSession) {
    match event {
        PlaybackEvent::TrackChanged(track) => {
            mpris.set_track(track.as_ref());
            mpris.set_length(session.duration);
            mpris.set_playback(session.state());
        }
        PlaybackEvent::PlayingChanged(_) => mpris.set_playback(session.state()),
        PlaybackEvent::PositionChanged(pos) => mpris.set_position(*pos),
        PlaybackEvent::DurationChanged(length) => mpris.set_length(*length),
        PlaybackEvent::MetadataChanged(meta) => {
            mpris.set_track_metadata(Some(meta));
            mpris.set_length(session.duration);
        }
        PlaybackEvent::QueueChanged { .. } | PlaybackEvent::LoadFailed { .. } => {}
    }
}
