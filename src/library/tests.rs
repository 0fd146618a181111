use std::fs;
use std::path::Path;

use tempfile::{TempDir, tempdir};

use super::*;
use crate::config::LibrarySettings;
use crate::error::ScanError;
use crate::store::LibraryStore;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"not real audio").unwrap();
}

/// `root/A/{song1,song2}.mp3`, `root/B/song3.mp3`, `root/C/readme.txt`.
fn sample_tree() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("A").join("song1.mp3"));
    touch(&root.join("A").join("song2.mp3"));
    touch(&root.join("B").join("song3.mp3"));
    touch(&root.join("C").join("readme.txt"));
    (dir, root)
}

fn track_names(registry: &PlaylistRegistry, name: &str) -> Vec<String> {
    let mut names: Vec<String> = registry
        .get(name)
        .unwrap()
        .tracks
        .iter()
        .map(|t| t.name.clone())
        .collect();
    names.sort();
    names
}

fn sorted_names(registry: &PlaylistRegistry) -> Vec<String> {
    let mut names: Vec<String> = registry.names().into_iter().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn scan_groups_by_directly_containing_folder() {
    let (_dir, root) = sample_tree();
    let mut registry = PlaylistRegistry::in_memory();

    let report = scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();

    assert_eq!(report.playlist_count(), 2);
    assert_eq!(report.track_count(), 3);
    assert_eq!(sorted_names(&registry), vec!["A", "B"]);
    assert_eq!(track_names(&registry, "A"), vec!["song1.mp3", "song2.mp3"]);
    assert_eq!(track_names(&registry, "B"), vec!["song3.mp3"]);
    assert!(registry.get("C").is_none());
    assert!(registry.get("root").is_none());
}

#[test]
fn rescan_replaces_tracks_instead_of_accumulating() {
    let (_dir, root) = sample_tree();
    let mut registry = PlaylistRegistry::in_memory();
    let settings = LibrarySettings::default();

    scan_tree(&mut registry, &root, &settings).unwrap();
    fs::remove_file(root.join("A").join("song2.mp3")).unwrap();
    scan_tree(&mut registry, &root, &settings).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(track_names(&registry, "A"), vec!["song1.mp3"]);
    assert_eq!(registry.get("A").unwrap().track_count, 1);
}

#[test]
fn root_with_direct_files_is_a_playlist_and_parents_do_not_aggregate() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("Music");
    touch(&root.join("top.mp3"));
    touch(&root.join("Artist").join("Album").join("deep.mp3"));

    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();

    assert_eq!(sorted_names(&registry), vec!["Album", "Music"]);
    assert_eq!(track_names(&registry, "Music"), vec!["top.mp3"]);
    assert!(registry.get("Artist").is_none());
}

#[test]
fn scan_registers_children_before_parent() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("Music");
    touch(&root.join("top.mp3"));
    touch(&root.join("Sub").join("inner.mp3"));

    let mut registry = PlaylistRegistry::in_memory();
    let report = scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();
    let order: Vec<&str> = report.registered.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(order, vec!["Sub", "Music"]);
}

#[test]
fn extension_match_is_case_insensitive_and_configurable() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("A").join("loud.MP3"));
    touch(&root.join("A").join("lossless.flac"));
    touch(&root.join("A").join("notes.txt"));

    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();
    assert_eq!(track_names(&registry, "A"), vec!["loud.MP3"]);

    let settings = LibrarySettings {
        extensions: vec![".FLAC".into(), "mp3".into()],
        ..LibrarySettings::default()
    };
    scan_tree(&mut registry, &root, &settings).unwrap();
    assert_eq!(track_names(&registry, "A"), vec!["lossless.flac", "loud.MP3"]);
}

#[test]
fn hidden_entries_are_skipped_unless_enabled() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("A").join(".ghost.mp3"));
    touch(&root.join("A").join("real.mp3"));
    touch(&root.join(".trash").join("old.mp3"));

    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();
    assert_eq!(sorted_names(&registry), vec!["A"]);
    assert_eq!(track_names(&registry, "A"), vec!["real.mp3"]);

    let settings = LibrarySettings {
        include_hidden: true,
        ..LibrarySettings::default()
    };
    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &settings).unwrap();
    assert_eq!(sorted_names(&registry), vec![".trash", "A"]);
}

#[test]
fn max_depth_caps_recursion() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("r.mp3"));
    touch(&root.join("d1").join("one.mp3"));
    touch(&root.join("d1").join("d2").join("two.mp3"));

    let settings = LibrarySettings {
        max_depth: Some(1),
        ..LibrarySettings::default()
    };
    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &settings).unwrap();
    assert_eq!(sorted_names(&registry), vec!["d1", "root"]);

    let flat = flat_listing(&root, &settings).unwrap().0;
    let mut flat_registry = PlaylistRegistry::in_memory();
    scan_flat(&mut flat_registry, flat, &settings).unwrap();
    assert_eq!(sorted_names(&flat_registry), vec!["d1", "root"]);
}

#[test]
fn top_level_pick_failure_aborts_without_touching_registry() {
    let (_dir, root) = sample_tree();
    let mut registry = PlaylistRegistry::in_memory();
    scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();

    let missing = root.join("nope");
    let err = scan_tree(&mut registry, &missing, &LibrarySettings::default()).unwrap_err();
    assert!(matches!(err, ScanError::NotFound(_)));

    let err = scan_tree(&mut registry, Path::new(""), &LibrarySettings::default()).unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));

    let err = scan_flat(&mut registry, Vec::new(), &LibrarySettings::default()).unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));

    assert_eq!(sorted_names(&registry), vec!["A", "B"]);
}

/// A scripted tree whose `broken` folders cannot be listed.
#[derive(Clone)]
struct FakeDir {
    name: String,
    files: Vec<&'static str>,
    dirs: Vec<FakeDir>,
    broken: bool,
}

impl FakeDir {
    fn new(name: &str, files: Vec<&'static str>, dirs: Vec<FakeDir>) -> Self {
        Self {
            name: name.to_string(),
            files,
            dirs,
            broken: false,
        }
    }

    fn broken(name: &str) -> Self {
        Self {
            broken: true,
            ..Self::new(name, Vec::new(), Vec::new())
        }
    }
}

impl DirectoryNode for FakeDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &Path {
        Path::new(&self.name)
    }

    fn children(&self) -> Result<Vec<Entry<Self>>, ScanError> {
        if self.broken {
            return Err(ScanError::PermissionDenied(self.name.clone().into()));
        }
        let files = self.files.iter().map(|f| {
            Entry::File(FileEntry::from(TrackRef::new(
                format!("/fake/{}/{f}", self.name),
                1,
            )))
        });
        let dirs = self.dirs.iter().cloned().map(Entry::Directory);
        Ok(files.chain(dirs).collect())
    }
}

#[test]
fn unreadable_subfolder_does_not_abort_siblings() {
    let root = FakeDir::new(
        "root",
        vec![],
        vec![
            FakeDir::new("A", vec!["a.mp3"], vec![]),
            FakeDir::broken("Broken"),
            FakeDir::new("B", vec!["b.mp3"], vec![]),
        ],
    );

    let mut registry = PlaylistRegistry::in_memory();
    let filter = AudioFilter::new(&LibrarySettings::default());
    let report = scan_source(&mut registry, &root, &filter, None).unwrap();

    assert_eq!(sorted_names(&registry), vec!["A", "B"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, Path::new("Broken"));
}

#[test]
fn unreadable_root_is_an_aborted_scan() {
    let root = FakeDir::broken("root");
    let mut registry = PlaylistRegistry::in_memory();
    let filter = AudioFilter::new(&LibrarySettings::default());
    let err = scan_source(&mut registry, &root, &filter, None).unwrap_err();
    assert!(matches!(err, ScanError::PermissionDenied(_)));
    assert!(registry.is_empty());
}

#[test]
fn flat_strategy_matches_tree_strategy() {
    let (_dir, root) = sample_tree();
    let settings = LibrarySettings::default();

    let mut tree = PlaylistRegistry::in_memory();
    scan_tree(&mut tree, &root, &settings).unwrap();

    let (entries, skipped) = flat_listing(&root, &settings).unwrap();
    assert!(skipped.is_empty());
    let mut flat = PlaylistRegistry::in_memory();
    scan_flat(&mut flat, entries, &settings).unwrap();

    assert_eq!(sorted_names(&tree), sorted_names(&flat));
    for name in tree.names() {
        assert_eq!(track_names(&tree, name), track_names(&flat, name));
    }
}

#[cfg(unix)]
#[test]
fn folders_linking_to_each_other_are_walked_once() {
    use std::os::unix::fs::symlink;

    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("A").join("a.mp3"));
    touch(&root.join("B").join("b.mp3"));
    symlink(root.join("B"), root.join("A").join("toB")).unwrap();
    symlink(root.join("A"), root.join("B").join("toA")).unwrap();
    let settings = LibrarySettings::default();

    let mut tree = PlaylistRegistry::in_memory();
    let mut tree_report = scan_tree(&mut tree, &root, &settings).unwrap();

    let (entries, _) = flat_listing(&root, &settings).unwrap();
    let mut flat = PlaylistRegistry::in_memory();
    let mut flat_report = scan_flat(&mut flat, entries, &settings).unwrap();

    tree_report.registered.sort();
    flat_report.registered.sort();
    assert_eq!(tree_report.registered, flat_report.registered);
    assert_eq!(sorted_names(&tree), vec!["A", "B", "toA", "toB"]);
    assert_eq!(track_names(&tree, "toB"), vec!["b.mp3"]);
    assert_eq!(track_names(&tree, "toA"), vec!["a.mp3"]);
}

#[test]
fn same_named_folders_are_reported_once() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("root");
    touch(&root.join("x").join("Live").join("1.mp3"));
    touch(&root.join("x").join("Live").join("2.mp3"));
    touch(&root.join("y").join("Live").join("3.mp3"));

    let mut registry = PlaylistRegistry::in_memory();
    let report = scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();

    assert_eq!(report.playlist_count(), 1);
    assert_eq!(registry.len(), 1);
    let kept = registry.get("Live").unwrap().tracks.len();
    assert_eq!(report.registered, vec![("Live".to_string(), kept)]);
    assert_eq!(report.track_count(), kept);
}

#[test]
fn flat_strategy_groups_by_immediate_parent_and_collects_loose_files() {
    let entries = vec![
        (TrackRef::new("/dl/x.mp3", 1), "Music/Jazz/x.mp3".to_string()),
        (TrackRef::new("/dl/y.mp3", 1), "Music/Jazz/y.mp3".to_string()),
        (TrackRef::new("/dl/z.mp3", 1), "Music/Rock/z.mp3".to_string()),
        (TrackRef::new("/dl/single.mp3", 1), "single.mp3".to_string()),
        (TrackRef::new("/dl/cover.jpg", 1), "Music/Rock/cover.jpg".to_string()),
    ];
    let settings = LibrarySettings::default();
    let mut registry = PlaylistRegistry::in_memory();
    scan_flat(&mut registry, entries, &settings).unwrap();

    assert_eq!(sorted_names(&registry), vec!["Jazz", "Loose Tracks", "Rock"]);
    assert_eq!(track_names(&registry, "Jazz"), vec!["x.mp3", "y.mp3"]);
    assert_eq!(track_names(&registry, "Rock"), vec!["z.mp3"]);
    assert_eq!(track_names(&registry, "Loose Tracks"), vec!["single.mp3"]);
}

#[test]
fn registering_same_name_twice_keeps_latest_tracks() {
    let mut registry = PlaylistRegistry::in_memory();
    registry.add(Playlist::new(
        "X",
        vec![TrackRef::new("/m/1.mp3", 1), TrackRef::new("/m/2.mp3", 1)],
    ));
    registry.add(Playlist::new("X", vec![TrackRef::new("/m/3.mp3", 1)]));

    assert_eq!(registry.len(), 1);
    assert_eq!(track_names(&registry, "X"), vec!["3.mp3"]);
}

#[test]
fn registry_update_remove_and_clear() {
    let mut registry = PlaylistRegistry::in_memory();
    registry.add(Playlist::new("A", vec![TrackRef::new("/m/a.mp3", 1)]));
    registry.add(Playlist::new("B", vec![]));

    assert!(registry.update("A", vec![TrackRef::new("/m/b.mp3", 1)]));
    assert!(!registry.update("Z", vec![]));
    assert_eq!(track_names(&registry, "A"), vec!["b.mp3"]);

    assert!(registry.remove("B").is_some());
    assert!(registry.remove("B").is_none());
    assert_eq!(registry.names(), vec!["A"]);

    registry.clear();
    assert!(registry.is_empty());
}

#[test]
fn append_unique_skips_duplicate_file_names() {
    let mut registry = PlaylistRegistry::in_memory();
    let added = registry.append_unique(
        "Picks",
        vec![TrackRef::new("/a/song.mp3", 1), TrackRef::new("/a/other.mp3", 1)],
    );
    assert_eq!(added, 2);

    let added = registry.append_unique(
        "Picks",
        vec![TrackRef::new("/b/song.mp3", 1), TrackRef::new("/b/new.mp3", 1)],
    );
    assert_eq!(added, 1);
    assert_eq!(
        track_names(&registry, "Picks"),
        vec!["new.mp3", "other.mp3", "song.mp3"]
    );

    let removed = registry.remove_track("Picks", 0).unwrap();
    assert_eq!(removed.name, "song.mp3");
    assert!(registry.remove_track("Picks", 10).is_none());
    assert_eq!(registry.get("Picks").unwrap().track_count, 2);
}

#[test]
fn restore_brings_back_names_and_counts_without_tracks() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("library.db");
    let (_music, root) = sample_tree();

    {
        let mut registry = PlaylistRegistry::new(LibraryStore::open(&db));
        scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();
    }

    let mut registry = PlaylistRegistry::new(LibraryStore::open(&db));
    assert_eq!(registry.restore(), 2);
    let a = registry.get("A").unwrap();
    assert_eq!(a.track_count, 2);
    assert!(a.tracks.is_empty());
    assert!(a.needs_rescan());

    // A rescan fills in the tracks without duplicating entries.
    scan_tree(&mut registry, &root, &LibrarySettings::default()).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(!registry.get("A").unwrap().needs_rescan());
    assert_eq!(registry.restore(), 0);
}

#[test]
fn removing_a_playlist_removes_its_stored_record() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("library.db");

    let mut registry = PlaylistRegistry::new(LibraryStore::open(&db));
    registry.add(Playlist::new("Keep", vec![TrackRef::new("/m/k.mp3", 1)]));
    registry.add(Playlist::new("Drop", vec![TrackRef::new("/m/d.mp3", 1)]));
    registry.remove("Drop");
    drop(registry);

    let mut registry = PlaylistRegistry::new(LibraryStore::open(&db));
    registry.restore();
    assert_eq!(registry.names(), vec!["Keep"]);
}
