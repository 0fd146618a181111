use std::path::PathBuf;

use serde::Deserialize;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/haacchi/config.toml` or `~/.config/haacchi/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `HAACCHI__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub playback: PlaybackSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// How the scanner acquires entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Walk the directory tree level by level.
    #[default]
    #[serde(alias = "tree-handle")]
    Tree,
    /// Enumerate every file with a relative path hint, then regroup.
    #[serde(alias = "flat-list")]
    Flat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directory scanned at startup when none is given on the command line.
    pub root: Option<PathBuf>,
    /// File extensions to treat as audio (case-insensitive, dot optional).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Optional cap on directory recursion depth (root = 0).
    pub max_depth: Option<usize>,
    pub strategy: ScanStrategy,
    /// Playlist name for flat entries whose path hint has no parent folder.
    pub loose_files_playlist: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            root: None,
            extensions: vec!["mp3".into()],
            follow_links: true,
            include_hidden: false,
            max_depth: None,
            strategy: ScanStrategy::Tree,
            loose_files_playlist: "Loose Tracks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Interval of the cooperative engine tick (milliseconds).
    pub tick_ms: u64,
    /// Register the MPRIS media-control service on the session bus.
    pub mpris: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            mpris: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Set to false to run without persistence; every store call becomes a no-op.
    pub enabled: bool,
    /// Database file. Defaults to `$XDG_DATA_HOME/haacchi/library.db`.
    pub path: Option<PathBuf>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
