use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::LibrarySettings;
use crate::error::ScanError;

use super::model::{Playlist, TrackRef};
use super::registry::PlaylistRegistry;
use super::source::{DirectoryNode, Entry, FlatDirectory, pick_directory};

/// A sub-directory that could not be read; its siblings were still scanned.
#[derive(Debug, Clone)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    /// Playlists registered by this scan, in registration order, with track counts.
    /// A folder whose name repeats replaces the earlier entry, as in the registry.
    pub registered: Vec<(String, usize)>,
    pub skipped: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn playlist_count(&self) -> usize {
        self.registered.len()
    }

    pub fn track_count(&self) -> usize {
        self.registered.iter().map(|(_, n)| n).sum()
    }
}

/// Decides which entries count as audio and which are hidden.
#[derive(Debug, Clone)]
pub struct AudioFilter {
    extensions: Vec<String>,
    include_hidden: bool,
}

impl AudioFilter {
    pub fn new(settings: &LibrarySettings) -> Self {
        let extensions = settings
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            extensions,
            include_hidden: settings.include_hidden,
        }
    }

    /// Case-insensitive extension match against the allow-list.
    pub fn is_audio(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| e == &ext)
            })
            .unwrap_or(false)
    }

    fn visible(&self, name: &str) -> bool {
        self.include_hidden || !name.starts_with('.')
    }
}

struct Walk<'a> {
    filter: &'a AudioFilter,
    max_depth: Option<usize>,
    groups: Vec<Playlist>,
    skipped: Vec<ScanFailure>,
}

impl Walk<'_> {
    /// Depth-first, children before parent. A directory becomes a playlist
    /// only when it directly holds matching files.
    fn visit<D: DirectoryNode>(&mut self, dir: &D, depth: usize) -> Result<(), ScanError> {
        let children = match dir.children() {
            Ok(c) => c,
            Err(e) if depth == 0 => return Err(e),
            Err(e) => {
                warn!(dir = %dir.location().display(), error = %e, "skipping unreadable folder");
                self.skipped.push(ScanFailure {
                    path: dir.location().to_path_buf(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let descend = self.max_depth.is_none_or(|max| depth < max);
        let mut tracks: Vec<TrackRef> = Vec::new();
        let mut subdirs: Vec<D> = Vec::new();
        for child in children {
            match child {
                Entry::File(f) if self.filter.visible(&f.name) && self.filter.is_audio(&f.name) => {
                    tracks.push(f.open());
                }
                Entry::Directory(d) if descend && self.filter.visible(d.name()) => subdirs.push(d),
                _ => {}
            }
        }

        for sub in &subdirs {
            debug!(dir = %sub.location().display(), "scanning folder");
            self.visit(sub, depth + 1)?;
        }

        if !tracks.is_empty() {
            debug!(playlist = dir.name(), tracks = tracks.len(), "folder holds audio");
            self.groups.push(Playlist::new(dir.name(), tracks));
        }
        Ok(())
    }
}

/// Group every folder of `root` into playlists and register them.
///
/// Nothing is registered if the root itself cannot be listed. Same-named
/// playlists are replaced wholesale, so rescanning reflects the current
/// state of the folder.
pub fn scan_source<D: DirectoryNode>(
    registry: &mut PlaylistRegistry,
    root: &D,
    filter: &AudioFilter,
    max_depth: Option<usize>,
) -> Result<ScanReport, ScanError> {
    let mut walk = Walk {
        filter,
        max_depth,
        groups: Vec::new(),
        skipped: Vec::new(),
    };
    walk.visit(root, 0)?;

    let mut report = ScanReport {
        registered: Vec::with_capacity(walk.groups.len()),
        skipped: walk.skipped,
    };
    for playlist in walk.groups {
        let entry = (playlist.name.clone(), playlist.tracks.len());
        match report.registered.iter_mut().find(|(n, _)| *n == entry.0) {
            Some(earlier) => {
                warn!(playlist = %entry.0, "another folder with this name replaces an earlier one");
                *earlier = entry;
            }
            None => report.registered.push(entry),
        }
        registry.add(playlist);
    }

    info!(
        root = %root.location().display(),
        playlists = report.playlist_count(),
        tracks = report.track_count(),
        skipped = report.skipped.len(),
        "scan finished"
    );
    Ok(report)
}

/// Tree strategy: open `root` and walk it level by level.
pub fn scan_tree(
    registry: &mut PlaylistRegistry,
    root: &Path,
    settings: &LibrarySettings,
) -> Result<ScanReport, ScanError> {
    let dir = pick_directory(root, settings.follow_links)?;
    scan_source(registry, &dir, &AudioFilter::new(settings), settings.max_depth)
}

/// Flat strategy: regroup `(track, relative path hint)` pairs by folder.
///
/// An empty selection is treated as a cancelled pick.
pub fn scan_flat(
    registry: &mut PlaylistRegistry,
    entries: Vec<(TrackRef, String)>,
    settings: &LibrarySettings,
) -> Result<ScanReport, ScanError> {
    if entries.is_empty() {
        return Err(ScanError::Cancelled);
    }
    let root = FlatDirectory::from_hints(entries, &settings.loose_files_playlist);
    // The virtual root sits one level above the picked folder.
    let max_depth = settings.max_depth.map(|d| d + 1);
    scan_source(registry, &root, &AudioFilter::new(settings), max_depth)
}
