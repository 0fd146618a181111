use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use xxhash_rust::xxh3::xxh3_64;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Stable identity of a track: hex xxh3 of its resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    pub fn for_path(path: &Path) -> Self {
        Self(format!(
            "{:016x}",
            xxh3_64(path.as_os_str().as_encoded_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to a playable audio resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub id: TrackId,
    pub path: PathBuf,
    /// File name including extension.
    pub name: String,
    /// Byte size, 0 when unknown.
    pub size: u64,
    pub mime: Option<&'static str>,
}

impl TrackRef {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: TrackId::for_path(&path),
            mime: mime_hint(&path),
            name,
            size,
            path,
        }
    }

    /// Build a ref from the filesystem, reading the byte size when available.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self::new(path, size)
    }

    /// File name without its extension; never empty.
    pub fn fallback_title(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

fn mime_hint(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => Some("audio/mpeg"),
        "flac" => Some("audio/flac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "wav" => Some("audio/wav"),
        "m4a" | "mp4" => Some("audio/mp4"),
        _ => None,
    }
}

/// A named grouping of tracks, unique by name within the registry.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<TrackRef>,
    /// Equals `tracks.len()` unless restored from the store before a rescan.
    pub track_count: usize,
    pub added: DateTime<Utc>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, tracks: Vec<TrackRef>) -> Self {
        Self {
            name: name.into(),
            track_count: tracks.len(),
            tracks,
            added: Utc::now(),
        }
    }

    /// A stored entry whose files are not known in this session.
    pub fn restored(name: impl Into<String>, track_count: usize, added: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            track_count,
            added,
        }
    }

    pub fn set_tracks(&mut self, tracks: Vec<TrackRef>) {
        self.track_count = tracks.len();
        self.tracks = tracks;
    }

    pub fn needs_rescan(&self) -> bool {
        self.tracks.is_empty() && self.track_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Display metadata derived for one track.
#[derive(Debug, Clone)]
pub struct EnrichedTrack {
    pub track: TrackRef,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: Option<Duration>,
    pub artwork: Option<Artwork>,
}

impl EnrichedTrack {
    /// Filename-derived defaults used whenever tags cannot be read.
    pub fn fallback(track: &TrackRef) -> Self {
        Self {
            title: track.fallback_title(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: None,
            duration: None,
            artwork: None,
            track: track.clone(),
        }
    }

    pub fn display(&self) -> String {
        if self.artist.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist.trim(), self.title)
        }
    }
}
