//! The audio device seam.
//!
//! [`AudioOutput`] is what the engine drives; [`RodioOutput`] implements it on
//! the default output device.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::debug;

use crate::error::PlaybackError;
use crate::library::TrackRef;

pub trait AudioOutput {
    /// Decode `track` and make it the bound resource, starting playback.
    ///
    /// The previously bound resource is released only once the new one is
    /// ready, so an error leaves the output exactly as it was. Returns the
    /// duration when the decoder knows it up front.
    fn load(&mut self, track: &TrackRef) -> Result<Option<Duration>, PlaybackError>;

    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, to: Duration) -> Result<(), PlaybackError>;

    /// Position within the bound resource; zero when nothing is bound.
    fn position(&self) -> Duration;

    /// The bound resource played to its end.
    fn is_finished(&self) -> bool;

    fn is_bound(&self) -> bool;

    /// Stop and drop the bound resource.
    fn release(&mut self);
}

struct Bound {
    sink: Sink,
    track: TrackRef,
    /// Added to the sink position after a rebuild-based seek.
    offset: Duration,
}

pub struct RodioOutput {
    stream: OutputStream,
    bound: Option<Bound>,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self, PlaybackError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlaybackError::NoOutputDevice(e.to_string()))?;
        // rodio prints to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self {
            stream,
            bound: None,
        })
    }
}

/// Create a paused `Sink` for `path` that starts playback at `start_at`.
fn create_sink_at(
    stream: &OutputStream,
    path: &Path,
    start_at: Duration,
) -> Result<(Sink, Option<Duration>), PlaybackError> {
    let load_err = |reason: String| PlaybackError::ResourceLoad {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| load_err(e.to_string()))?;
    let total = decoder.total_duration();

    let sink = Sink::connect_new(stream.mixer());
    sink.append(decoder.skip_duration(start_at));
    sink.pause();
    Ok((sink, total))
}

impl AudioOutput for RodioOutput {
    fn load(&mut self, track: &TrackRef) -> Result<Option<Duration>, PlaybackError> {
        let (sink, total) = create_sink_at(&self.stream, &track.path, Duration::ZERO)?;
        if let Some(old) = self.bound.take() {
            old.sink.stop();
        }
        sink.play();
        debug!(track = %track.name, "resource bound");
        self.bound = Some(Bound {
            sink,
            track: track.clone(),
            offset: Duration::ZERO,
        });
        Ok(total)
    }

    fn play(&mut self) {
        if let Some(b) = &self.bound {
            b.sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(b) = &self.bound {
            b.sink.pause();
        }
    }

    fn seek(&mut self, to: Duration) -> Result<(), PlaybackError> {
        let Some(b) = self.bound.as_mut() else {
            return Ok(());
        };

        match b.sink.try_seek(to) {
            Ok(()) => {
                b.offset = Duration::ZERO;
                return Ok(());
            }
            Err(e) => debug!(error = %e, "decoder cannot seek, rebuilding sink"),
        }

        // Fallback: decode again and skip into the file.
        let paused = b.sink.is_paused();
        let (sink, _) = create_sink_at(&self.stream, &b.track.path, to)?;
        b.sink.stop();
        if !paused {
            sink.play();
        }
        b.sink = sink;
        b.offset = to;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.bound
            .as_ref()
            .map_or(Duration::ZERO, |b| b.offset + b.sink.get_pos())
    }

    fn is_finished(&self) -> bool {
        self.bound.as_ref().is_some_and(|b| b.sink.empty())
    }

    fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    fn release(&mut self) {
        if let Some(b) = self.bound.take() {
            b.sink.stop();
        }
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        self.release();
    }
}
