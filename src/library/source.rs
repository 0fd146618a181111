//! Entry sources the scanner can walk.
//!
//! Two acquisition strategies feed the same grouping walk:
//! - [`FsDirectory`]: a directory tree opened level by level.
//! - [`FlatDirectory`]: a flat list of files carrying relative path hints
//!   (`"Music/A/song.mp3"`), rebuilt into a virtual tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::ScanError;

use super::model::TrackRef;
use super::scan::ScanFailure;

/// A file as listed by its directory; not opened yet.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    size: Option<u64>,
}

impl FileEntry {
    /// Resolve the entry into a track reference.
    pub fn open(&self) -> TrackRef {
        match self.size {
            Some(size) => TrackRef::new(&self.path, size),
            None => TrackRef::from_path(&self.path),
        }
    }
}

impl From<TrackRef> for FileEntry {
    fn from(track: TrackRef) -> Self {
        Self {
            name: track.name,
            size: Some(track.size),
            path: track.path,
        }
    }
}

pub enum Entry<D> {
    File(FileEntry),
    Directory(D),
}

/// One directory level of an entry source.
pub trait DirectoryNode: Sized {
    fn name(&self) -> &str;
    /// Location used in failure reports.
    fn location(&self) -> &Path;
    fn children(&self) -> Result<Vec<Entry<Self>>, ScanError>;
}

/// Name of a directory as shown to the user; resolves `.` and `..`.
fn dir_name(path: &Path) -> String {
    if let Some(n) = path.file_name() {
        return n.to_string_lossy().into_owned();
    }
    path.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone)]
pub struct FsDirectory {
    name: String,
    path: PathBuf,
    follow_links: bool,
    canonical: Option<PathBuf>,
    /// Canonical paths of every directory above this one in the walk.
    ancestors: Vec<PathBuf>,
}

/// Open the user-chosen root directory.
///
/// An empty selection is a cancellation; permission and existence problems
/// map onto the matching [`ScanError`] variants.
pub fn pick_directory(path: &Path, follow_links: bool) -> Result<FsDirectory, ScanError> {
    if path.as_os_str().is_empty() {
        return Err(ScanError::Cancelled);
    }
    let meta = fs::metadata(path).map_err(|e| ScanError::from_io(path.to_path_buf(), e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(FsDirectory {
        name: dir_name(path),
        path: path.to_path_buf(),
        follow_links,
        canonical: path.canonicalize().ok(),
        ancestors: Vec::new(),
    })
}

impl FsDirectory {
    fn child(&self, name: String, path: PathBuf, canonical: Option<PathBuf>) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.extend(self.canonical.clone());
        Self {
            name,
            path,
            follow_links: self.follow_links,
            canonical,
            ancestors,
        }
    }

    /// True when `target` is this directory or any directory above it in the walk.
    fn is_cycle(&self, target: &Path) -> bool {
        self.canonical.as_deref() == Some(target) || self.ancestors.iter().any(|a| a == target)
    }
}

impl DirectoryNode for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn children(&self) -> Result<Vec<Entry<Self>>, ScanError> {
        let rd = fs::read_dir(&self.path).map_err(|e| ScanError::from_io(self.path.clone(), e))?;

        let mut out = Vec::new();
        for entry in rd {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(dir = %self.path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            let Ok(mut file_type) = entry.file_type() else {
                continue;
            };
            let mut canonical = None;
            if file_type.is_symlink() {
                if !self.follow_links {
                    continue;
                }
                match fs::metadata(&path) {
                    Ok(m) => file_type = m.file_type(),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "dangling symlink");
                        continue;
                    }
                }
                if file_type.is_dir() {
                    canonical = path.canonicalize().ok();
                    if canonical.as_deref().is_some_and(|c| self.is_cycle(c)) {
                        warn!(path = %path.display(), "symlink cycle, not descending");
                        continue;
                    }
                }
            } else if file_type.is_dir() {
                canonical = self.canonical.as_ref().map(|c| c.join(&name));
            }

            if file_type.is_dir() {
                out.push(Entry::Directory(self.child(name, path, canonical)));
            } else if file_type.is_file() {
                out.push(Entry::File(FileEntry {
                    name,
                    path,
                    size: None,
                }));
            }
        }
        Ok(out)
    }
}

/// Virtual directory rebuilt from relative path hints.
#[derive(Debug, Clone, Default)]
pub struct FlatDirectory {
    name: String,
    path: PathBuf,
    files: Vec<FileEntry>,
    dirs: Vec<FlatDirectory>,
}

impl FlatDirectory {
    /// Rebuild the tree implied by `(track, relative path hint)` pairs.
    ///
    /// The returned node is a virtual root named `loose_name`; hints without a
    /// parent segment land directly in it so they still form a playlist.
    /// Child order follows first appearance in the input.
    pub fn from_hints<I>(entries: I, loose_name: &str) -> Self
    where
        I: IntoIterator<Item = (TrackRef, String)>,
    {
        let mut root = FlatDirectory {
            name: loose_name.to_string(),
            ..Self::default()
        };

        for (track, hint) in entries {
            let segments: Vec<&str> = hint
                .split(['/', '\\'])
                .filter(|s| !s.is_empty() && *s != ".")
                .collect();
            let parents = segments.split_last().map(|(_, p)| p).unwrap_or(&[]);

            let mut node = &mut root;
            for seg in parents {
                node = node.subdir(seg);
            }
            node.files.push(FileEntry::from(track));
        }
        root
    }

    fn subdir(&mut self, name: &str) -> &mut FlatDirectory {
        let idx = match self.dirs.iter().position(|d| d.name == name) {
            Some(i) => i,
            None => {
                self.dirs.push(FlatDirectory {
                    name: name.to_string(),
                    path: self.path.join(name),
                    ..Self::default()
                });
                self.dirs.len() - 1
            }
        };
        &mut self.dirs[idx]
    }
}

impl DirectoryNode for FlatDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn children(&self) -> Result<Vec<Entry<Self>>, ScanError> {
        Ok(self
            .files
            .iter()
            .cloned()
            .map(Entry::File)
            .chain(self.dirs.iter().cloned().map(Entry::Directory))
            .collect())
    }
}

fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Emulate a flat multi-file picker over `root`: every file below it with a
/// relative path hint that starts with the root folder's own name.
///
/// Unreadable sub-directories are reported and skipped.
pub fn flat_listing(
    root: &Path,
    settings: &LibrarySettings,
) -> Result<(Vec<(TrackRef, String)>, Vec<ScanFailure>), ScanError> {
    let picked = pick_directory(root, settings.follow_links)?;
    // The root itself must be listable, otherwise the pick failed.
    fs::read_dir(root).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;

    let mut walker = WalkDir::new(root).follow_links(settings.follow_links);
    if let Some(d) = settings.max_depth {
        // Files live one level below the deepest directory visited.
        walker = walker.max_depth(d + 1);
    }

    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| {
        settings.include_hidden
            || e.depth() == 0
            || !is_hidden_name(&e.file_name().to_string_lossy())
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), error = %e, "skipping unreadable directory");
                skipped.push(ScanFailure {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let mut hint = picked.name().to_string();
        for part in rel.components() {
            hint.push('/');
            hint.push_str(&part.as_os_str().to_string_lossy());
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        entries.push((TrackRef::new(entry.path(), size), hint));
    }

    Ok((entries, skipped))
}
