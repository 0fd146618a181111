//! Local persistence for playlist names/counts and enriched track records.
//!
//! Backed by SQLite. The connection is opened on first use; if the store
//! is disabled or cannot be opened every operation degrades to a no-op and
//! reads come back empty. Failures are logged, never returned.
//!
//! # Tables
//!
//! * `playlists` - one row per playlist name with its last known track count.
//! * `tracks` - enriched track records keyed by track id, indexed by title
//!   and artist.
//!
//! File handles are never stored: a restored playlist has a name and a
//! count but no tracks until the next scan.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::StoreError;
use crate::library::EnrichedTrack;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlaylistRecord {
    pub name: String,
    pub track_count: usize,
    pub added: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Seconds; 0.0 when unknown.
    pub duration: f64,
    pub url: String,
    pub cover_url: Option<String>,
    pub added: DateTime<Utc>,
}

impl From<&EnrichedTrack> for TrackRecord {
    fn from(m: &EnrichedTrack) -> Self {
        Self {
            id: m.track.id.to_string(),
            title: m.title.clone(),
            artist: m.artist.clone(),
            album: m.album.clone(),
            duration: m.duration.map_or(0.0, |d| d.as_secs_f64()),
            url: m.track.url(),
            cover_url: None,
            added: Utc::now(),
        }
    }
}

enum Target {
    File(PathBuf),
    Memory,
}

enum Backend {
    Disabled,
    Pending(Target),
    Ready(Connection),
    Unavailable,
}

pub struct LibraryStore {
    backend: Backend,
}

impl LibraryStore {
    /// A store backed by the SQLite file at `path`, opened on first use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Pending(Target::File(path.into())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Pending(Target::Memory),
        }
    }

    /// A store that silently ignores every call.
    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        if !settings.storage.enabled {
            return Self::disabled();
        }
        match settings.database_path() {
            Some(path) => Self::open(path),
            None => {
                warn!("no location for the library database, persistence disabled");
                Self::disabled()
            }
        }
    }

    /// Whether calls reach a database. Opens the connection if still pending.
    pub fn is_available(&mut self) -> bool {
        self.connection().is_some()
    }

    fn connection(&mut self) -> Option<&Connection> {
        if let Backend::Pending(target) = &self.backend {
            let opened = match target {
                Target::File(path) => open_file(path),
                Target::Memory => Connection::open_in_memory().map_err(StoreError::from),
            }
            .and_then(|conn| {
                create_schema(&conn)?;
                Ok(conn)
            });

            self.backend = match opened {
                Ok(conn) => {
                    debug!("library store ready");
                    Backend::Ready(conn)
                }
                Err(e) => {
                    warn!(error = %e, "persistence unavailable, continuing without it");
                    Backend::Unavailable
                }
            };
        }

        match &self.backend {
            Backend::Ready(conn) => Some(conn),
            Backend::Disabled | Backend::Pending(_) | Backend::Unavailable => None,
        }
    }

    fn with_conn<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Option<T> {
        let conn = self.connection()?;
        match f(conn) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(op, error = %e, "store operation failed");
                None
            }
        }
    }

    /// Insert or update a playlist row. The first `added` timestamp is kept.
    pub fn save_playlist(&mut self, record: &StoredPlaylistRecord) {
        self.with_conn("save_playlist", |conn| {
            conn.prepare_cached(
                "INSERT INTO playlists (name, track_count, added) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET track_count = excluded.track_count",
            )?
            .execute(params![
                record.name,
                record.track_count as i64,
                record.added.timestamp()
            ])?;
            Ok(())
        });
    }

    pub fn load_playlists(&mut self) -> Vec<StoredPlaylistRecord> {
        self.with_conn("load_playlists", |conn| {
            let mut stmt = conn
                .prepare_cached("SELECT name, track_count, added FROM playlists ORDER BY added, name")?;
            let rows = stmt.query_map([], |row| {
                Ok(StoredPlaylistRecord {
                    name: row.get(0)?,
                    track_count: row.get::<_, i64>(1)?.max(0) as usize,
                    added: from_timestamp(row.get(2)?),
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .unwrap_or_default()
    }

    pub fn delete_playlist(&mut self, name: &str) {
        self.with_conn("delete_playlist", |conn| {
            conn.prepare_cached("DELETE FROM playlists WHERE name = ?1")?
                .execute(params![name])?;
            Ok(())
        });
    }

    pub fn clear_playlists(&mut self) {
        self.with_conn("clear_playlists", |conn| {
            conn.execute("DELETE FROM playlists", [])?;
            Ok(())
        });
    }

    /// Insert or replace a track record by id.
    pub fn save_track(&mut self, track: &TrackRecord) {
        self.with_conn("save_track", |conn| {
            conn.prepare_cached(
                "INSERT OR REPLACE INTO tracks
                 (id, title, artist, album, duration, url, cover_url, added)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                track.id,
                track.title,
                track.artist,
                track.album,
                track.duration,
                track.url,
                track.cover_url,
                track.added.timestamp(),
            ])?;
            Ok(())
        });
    }

    pub fn get_track(&mut self, id: &str) -> Option<TrackRecord> {
        self.with_conn("get_track", |conn| {
            Ok(conn
                .prepare_cached(&select_tracks("WHERE id = ?1"))?
                .query_row(params![id], track_from_row)
                .optional()?)
        })
        .flatten()
    }

    pub fn delete_track(&mut self, id: &str) {
        self.with_conn("delete_track", |conn| {
            conn.prepare_cached("DELETE FROM tracks WHERE id = ?1")?
                .execute(params![id])?;
            Ok(())
        });
    }

    pub fn all_tracks(&mut self) -> Vec<TrackRecord> {
        self.query_tracks("all_tracks", "ORDER BY added, id", None)
    }

    pub fn tracks_by_title(&mut self, title: &str) -> Vec<TrackRecord> {
        self.query_tracks("tracks_by_title", "WHERE title = ?1 ORDER BY id", Some(title))
    }

    pub fn tracks_by_artist(&mut self, artist: &str) -> Vec<TrackRecord> {
        self.query_tracks("tracks_by_artist", "WHERE artist = ?1 ORDER BY title, id", Some(artist))
    }

    fn query_tracks(
        &mut self,
        op: &'static str,
        clause: &str,
        key: Option<&str>,
    ) -> Vec<TrackRecord> {
        self.with_conn(op, |conn| {
            let mut stmt = conn.prepare_cached(&select_tracks(clause))?;
            let rows = match key {
                Some(k) => stmt.query_map(params![k], track_from_row)?,
                None => stmt.query_map([], track_from_row)?,
            };
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .unwrap_or_default()
    }
}

fn open_file(path: &Path) -> Result<Connection, StoreError> {
    if path.is_dir() {
        return Err(StoreError::Unavailable(format!(
            "{} is a directory",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS playlists (
            name TEXT PRIMARY KEY NOT NULL,
            track_count INTEGER NOT NULL,
            added INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            album TEXT,
            duration REAL NOT NULL,
            url TEXT NOT NULL,
            cover_url TEXT,
            added INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_title ON tracks (title);
        CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks (artist);

        COMMIT;",
    )?;
    Ok(())
}

fn select_tracks(clause: &str) -> String {
    format!(
        "SELECT id, title, artist, album, duration, url, cover_url, added FROM tracks {clause}"
    )
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<TrackRecord> {
    Ok(TrackRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        duration: row.get(4)?,
        url: row.get(5)?,
        cover_url: row.get(6)?,
        added: from_timestamp(row.get(7)?),
    })
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
