//! haacchi: folder-scanned playlists and a single-session playback engine.

pub mod audio;
pub mod config;
pub mod error;
pub mod library;
pub mod mpris;
pub mod runtime;
pub mod store;
