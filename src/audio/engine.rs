//! The playback state machine.
//!
//! One engine owns one [`AudioOutput`] and the single [`PlaybackSession`].
//! Commands mutate the session synchronously, then publish
//! [`PlaybackEvent`]s to every subscriber. Metadata enrichment runs on a
//! worker thread per `play`; its result is applied by [`PlaybackEngine::tick`]
//! only if it still belongs to the current track.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::library::{EnrichedTrack, MetadataExtractor, TrackId, TrackRef, extract_metadata};

use super::output::AudioOutput;
use super::types::{PlaybackEvent, PlaybackSession};

/// Result of one background enrichment, tagged with the play it belongs to.
struct Enrichment {
    generation: u64,
    track: TrackId,
    metadata: EnrichedTrack,
}

pub struct PlaybackEngine {
    output: Box<dyn AudioOutput>,
    extractor: Arc<dyn MetadataExtractor>,
    session: PlaybackSession,
    subscribers: Vec<Sender<PlaybackEvent>>,
    /// Bumped on every successful `play`.
    generation: u64,
    enrich_tx: Sender<Enrichment>,
    enrich_rx: Receiver<Enrichment>,
}

impl PlaybackEngine {
    pub fn new(output: Box<dyn AudioOutput>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        let (enrich_tx, enrich_rx) = mpsc::channel();
        Self {
            output,
            extractor,
            session: PlaybackSession::default(),
            subscribers: Vec::new(),
            generation: 0,
            enrich_tx,
            enrich_rx,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn is_playing(&self) -> bool {
        self.session.playing
    }

    /// Register a new listener. Events are delivered in transition order;
    /// a dropped receiver is forgotten on the next publish.
    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|s| s.send(event.clone()).is_ok());
    }

    /// Start `track` from the beginning.
    ///
    /// With `queue`, the queue is replaced and the position becomes the
    /// track's index in it (0 if absent). Without one, the position follows
    /// the track if it is already queued; otherwise the queue becomes just
    /// this track. On error nothing changes.
    pub fn play(
        &mut self,
        track: TrackRef,
        queue: Option<Vec<TrackRef>>,
    ) -> Result<(), PlaybackError> {
        let (queue, position) = match queue {
            Some(q) => {
                let pos = q.iter().position(|t| t.id == track.id).unwrap_or(0);
                (Some(q), pos)
            }
            None => match self.session.queue.iter().position(|t| t.id == track.id) {
                Some(pos) => (None, pos),
                None => (Some(vec![track.clone()]), 0),
            },
        };
        self.bind(track, queue, position)
    }

    fn bind(
        &mut self,
        track: TrackRef,
        queue: Option<Vec<TrackRef>>,
        position: usize,
    ) -> Result<(), PlaybackError> {
        let duration = match self.output.load(&track) {
            Ok(d) => d,
            Err(e) => {
                warn!(track = %track.name, error = %e, "could not start track");
                self.emit(PlaybackEvent::LoadFailed {
                    track,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let queue_replaced = queue.is_some();
        if let Some(q) = queue {
            self.session.queue = q;
        }
        let position_moved = self.session.queue_position != position;
        self.session.queue_position = position;
        self.session.current = Some(track.clone());
        self.session.playing = true;
        self.session.position = Duration::ZERO;
        self.session.duration = duration;
        self.session.metadata = None;
        self.generation += 1;

        info!(track = %track.name, position, "playing");
        self.spawn_enrichment(track.clone());

        if queue_replaced || position_moved {
            self.emit(PlaybackEvent::QueueChanged {
                len: self.session.queue.len(),
                position,
            });
        }
        self.emit(PlaybackEvent::TrackChanged(Some(track)));
        self.emit(PlaybackEvent::PlayingChanged(true));
        self.emit(PlaybackEvent::PositionChanged(Duration::ZERO));
        self.emit(PlaybackEvent::DurationChanged(duration));
        Ok(())
    }

    fn spawn_enrichment(&self, track: TrackRef) {
        let tx = self.enrich_tx.clone();
        let extractor = Arc::clone(&self.extractor);
        let generation = self.generation;
        let spawned = thread::Builder::new()
            .name("enrich".into())
            .spawn(move || {
                let metadata = extract_metadata(extractor.as_ref(), &track);
                let _ = tx.send(Enrichment {
                    generation,
                    track: track.id,
                    metadata,
                });
            });
        if let Err(e) = spawned {
            warn!(error = %e, "could not spawn metadata worker");
        }
    }

    pub fn pause(&mut self) {
        if !self.output.is_bound() || !self.session.playing {
            return;
        }
        self.output.pause();
        self.session.playing = false;
        self.session.position = self.clamped(self.output.position());
        self.emit(PlaybackEvent::PlayingChanged(false));
    }

    pub fn resume(&mut self) {
        if !self.output.is_bound() || self.session.playing {
            return;
        }
        self.output.play();
        self.session.playing = true;
        self.emit(PlaybackEvent::PlayingChanged(true));
    }

    pub fn toggle_play_pause(&mut self) {
        if self.session.playing {
            self.pause();
        } else {
            self.resume();
        }
    }

    /// Advance circularly. No-op on an empty queue.
    pub fn next(&mut self) -> Result<(), PlaybackError> {
        let len = self.session.queue.len();
        if len == 0 {
            return Ok(());
        }
        let pos = (self.session.queue_position + 1) % len;
        let track = self.session.queue[pos].clone();
        self.bind(track, None, pos)
    }

    /// Step back circularly. No-op on an empty queue.
    pub fn previous(&mut self) -> Result<(), PlaybackError> {
        let len = self.session.queue.len();
        if len == 0 {
            return Ok(());
        }
        let pos = match self.session.queue_position {
            0 => len - 1,
            p => (p - 1).min(len - 1),
        };
        let track = self.session.queue[pos].clone();
        self.bind(track, None, pos)
    }

    /// Jump within the current track. Not clamped; no-op when nothing is bound.
    pub fn seek(&mut self, to: Duration) {
        if !self.output.is_bound() {
            return;
        }
        if let Err(e) = self.output.seek(to) {
            warn!(error = %e, "seek failed");
            return;
        }
        self.session.position = to;
        self.emit(PlaybackEvent::PositionChanged(to));
    }

    /// Replace the queue without interrupting the current track.
    pub fn set_queue(&mut self, queue: Vec<TrackRef>) {
        let current = self.session.current.as_ref().map(|t| &t.id);
        self.session.queue_position = queue
            .iter()
            .position(|t| Some(&t.id) == current)
            .unwrap_or(0);
        self.session.queue = queue;
        self.emit(PlaybackEvent::QueueChanged {
            len: self.session.queue.len(),
            position: self.session.queue_position,
        });
    }

    /// Periodic housekeeping: apply finished enrichments, refresh the
    /// position, and advance when the current track ran out.
    pub fn tick(&mut self) {
        self.apply_enrichments();

        if !self.output.is_bound() {
            return;
        }

        if self.session.playing && self.output.is_finished() {
            debug!("track ended");
            self.output.release();
            let advanced = !self.session.queue.is_empty() && self.next().is_ok();
            if !advanced {
                self.unbind();
            }
            return;
        }

        let pos = self.clamped(self.output.position());
        if pos != self.session.position {
            self.session.position = pos;
            self.emit(PlaybackEvent::PositionChanged(pos));
        }
    }

    fn apply_enrichments(&mut self) {
        while let Ok(done) = self.enrich_rx.try_recv() {
            let current = self.session.current.as_ref().map(|t| &t.id);
            if done.generation != self.generation || current != Some(&done.track) {
                debug!(track = %done.track, "discarding stale metadata");
                continue;
            }

            if self.session.duration.is_none() && done.metadata.duration.is_some() {
                self.session.duration = done.metadata.duration;
                self.emit(PlaybackEvent::DurationChanged(done.metadata.duration));
            }
            self.session.metadata = Some(done.metadata.clone());
            self.emit(PlaybackEvent::MetadataChanged(done.metadata));
        }
    }

    /// Back to idle once the output is released. The queue is kept, so
    /// `next`, `previous` and `play` still work.
    fn unbind(&mut self) {
        info!("nothing left to play");
        self.session.current = None;
        self.session.metadata = None;
        self.session.position = Duration::ZERO;
        self.session.duration = None;
        if self.session.playing {
            self.session.playing = false;
            self.emit(PlaybackEvent::PlayingChanged(false));
        }
        self.emit(PlaybackEvent::TrackChanged(None));
    }

    fn clamped(&self, pos: Duration) -> Duration {
        self.session.duration.map_or(pos, |d| pos.min(d))
    }

    /// Release the output. The session keeps its last state.
    pub fn shutdown(&mut self) {
        self.output.release();
        if self.session.playing {
            self.session.playing = false;
            self.emit(PlaybackEvent::PlayingChanged(false));
        }
    }
}
