//! In-memory collection of playlists, unique by name.
//!
//! Names and counts are mirrored to the [`LibraryStore`]; track handles are
//! not, so entries restored at startup stay empty until the next scan.

use tracing::{debug, info};

use crate::store::{LibraryStore, StoredPlaylistRecord};

use super::model::{Playlist, TrackRef};

pub struct PlaylistRegistry {
    playlists: Vec<Playlist>,
    store: LibraryStore,
}

impl PlaylistRegistry {
    pub fn new(store: LibraryStore) -> Self {
        Self {
            playlists: Vec::new(),
            store,
        }
    }

    /// Registry without persistence.
    pub fn in_memory() -> Self {
        Self::new(LibraryStore::disabled())
    }

    pub fn store_mut(&mut self) -> &mut LibraryStore {
        &mut self.store
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.playlists.iter().position(|p| p.name == name)
    }

    fn persist(&mut self, idx: usize) {
        let p = &self.playlists[idx];
        let record = StoredPlaylistRecord {
            name: p.name.clone(),
            track_count: p.track_count,
            added: p.added,
        };
        self.store.save_playlist(&record);
    }

    /// Register `playlist`, replacing the tracks of a same-named entry
    /// wholesale. The existing entry keeps its position and `added` date.
    pub fn add(&mut self, playlist: Playlist) {
        let idx = match self.position(&playlist.name) {
            Some(i) => {
                debug!(playlist = %playlist.name, tracks = playlist.tracks.len(), "replacing playlist");
                self.playlists[i].set_tracks(playlist.tracks);
                i
            }
            None => {
                debug!(playlist = %playlist.name, tracks = playlist.tracks.len(), "adding playlist");
                self.playlists.push(playlist);
                self.playlists.len() - 1
            }
        };
        self.persist(idx);
    }

    /// Replace the tracks of an existing playlist. Returns false if absent.
    pub fn update(&mut self, name: &str, tracks: Vec<TrackRef>) -> bool {
        let Some(idx) = self.position(name) else {
            return false;
        };
        self.playlists[idx].set_tracks(tracks);
        self.persist(idx);
        true
    }

    /// Append tracks by hand, skipping any whose file name is already in
    /// the playlist. Creates the playlist when missing. Returns how many
    /// tracks were added.
    pub fn append_unique(&mut self, name: &str, tracks: Vec<TrackRef>) -> usize {
        let idx = match self.position(name) {
            Some(i) => i,
            None => {
                self.playlists.push(Playlist::new(name, Vec::new()));
                self.playlists.len() - 1
            }
        };

        let mut merged = self.playlists[idx].tracks.clone();
        let before = merged.len();
        for t in tracks {
            if !merged.iter().any(|m| m.name == t.name) {
                merged.push(t);
            }
        }
        let added = merged.len() - before;
        self.playlists[idx].set_tracks(merged);
        self.persist(idx);
        added
    }

    /// Remove one track by position. Returns the removed track.
    pub fn remove_track(&mut self, name: &str, index: usize) -> Option<TrackRef> {
        let idx = self.position(name)?;
        if index >= self.playlists[idx].tracks.len() {
            return None;
        }
        let mut tracks = self.playlists[idx].tracks.clone();
        let removed = tracks.remove(index);
        self.playlists[idx].set_tracks(tracks);
        self.persist(idx);
        Some(removed)
    }

    pub fn remove(&mut self, name: &str) -> Option<Playlist> {
        let idx = self.position(name)?;
        let removed = self.playlists.remove(idx);
        self.store.delete_playlist(name);
        info!(playlist = %name, "playlist removed");
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.playlists.clear();
        self.store.clear_playlists();
        info!("all playlists removed");
    }

    /// Load stored names and counts. Entries already present are kept as is.
    /// Returns how many playlists were restored.
    pub fn restore(&mut self) -> usize {
        let mut restored = 0;
        for record in self.store.load_playlists() {
            if self.position(&record.name).is_some() {
                continue;
            }
            self.playlists
                .push(Playlist::restored(record.name, record.track_count, record.added));
            restored += 1;
        }
        if restored > 0 {
            info!(playlists = restored, "restored playlists from store");
        }
        restored
    }

    pub fn get(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Playlist> {
        self.playlists.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.playlists.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}
