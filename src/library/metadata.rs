//! Track enrichment: tags, duration and cover art.
//!
//! Extraction is best effort. Callers go through [`extract_metadata`],
//! which swaps any failure for filename-derived defaults.

use lofty::prelude::*;
use tracing::debug;

use crate::error::ExtractionError;

use super::model::{Artwork, EnrichedTrack, TrackRef, UNKNOWN_ARTIST};

/// Source of display metadata for a track.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, track: &TrackRef) -> Result<EnrichedTrack, ExtractionError>;
}

/// Reads tags and audio properties with `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, track: &TrackRef) -> Result<EnrichedTrack, ExtractionError> {
        let tagged = lofty::read_from_path(&track.path)?;

        let mut enriched = EnrichedTrack::fallback(track);
        enriched.duration = Some(tagged.properties().duration()).filter(|d| !d.is_zero());

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Ok(enriched);
        };

        if let Some(v) = non_empty(tag.title().as_deref()) {
            enriched.title = v;
        }
        if let Some(v) = non_empty(tag.artist().as_deref()) {
            enriched.artist = v;
        }
        enriched.album = non_empty(tag.album().as_deref());
        enriched.artwork = tag.pictures().first().map(|p| Artwork {
            mime_type: p.mime_type().map(|m| m.as_str().to_string()),
            data: p.data().to_vec(),
        });

        Ok(enriched)
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Enrich `track`, never failing: on error the title comes from the file
/// name and the artist is a placeholder.
pub fn extract_metadata(extractor: &dyn MetadataExtractor, track: &TrackRef) -> EnrichedTrack {
    match extractor.extract(track) {
        Ok(mut enriched) => {
            if enriched.title.trim().is_empty() {
                enriched.title = track.fallback_title();
            }
            if enriched.artist.trim().is_empty() {
                enriched.artist = UNKNOWN_ARTIST.to_string();
            }
            enriched
        }
        Err(e) => {
            debug!(track = %track.name, error = %e, "metadata unavailable, using filename");
            EnrichedTrack::fallback(track)
        }
    }
}
