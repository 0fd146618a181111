//! Library: track/playlist model, folder scanning and the playlist registry.
//!
//! The scanner groups audio files by the folder that directly contains them
//! and registers one playlist per such folder with the registry.

mod metadata;
mod model;
mod registry;
mod scan;
mod source;

pub use metadata::{LoftyExtractor, MetadataExtractor, extract_metadata};
pub use model::*;
pub use registry::PlaylistRegistry;
pub use scan::{AudioFilter, ScanFailure, ScanReport, scan_flat, scan_source, scan_tree};
pub use source::{DirectoryNode, Entry, FileEntry, FlatDirectory, FsDirectory, flat_listing, pick_directory};

#[cfg(test)]
mod tests;
