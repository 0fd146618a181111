//! Playback: the engine state machine and the device it drives.

mod engine;
mod output;
mod types;

pub use engine::PlaybackEngine;
pub use output::{AudioOutput, RodioOutput};
pub use types::{PlaybackEvent, PlaybackSession, PlaybackState};
