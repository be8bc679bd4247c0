//! Timed transcript segments and their extraction from raw transcription output.

use crate::transcription::{RawSegment, RawTranscription};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Identifier of a segment, unique within one transcript.
pub type SegmentId = i64;

/// A contiguous, timestamped span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds, never before `start`.
    pub end: f64,
    /// Transcribed text, verbatim.
    pub text: String,
}

impl Segment {
    /// Validate a raw record. Returns `None` for records that cannot be used.
    fn from_raw(raw: &RawSegment) -> Option<Self> {
        let (id, start, end, text) = (raw.id?, raw.start?, raw.end?, raw.text.as_ref()?);

        if !start.is_finite() || !end.is_finite() || end < start {
            return None;
        }

        Some(Self {
            id,
            start,
            end,
            text: text.clone(),
        })
    }
}

/// Segments of one transcript keyed by id, iterated in transcription order.
#[derive(Debug, Clone, Default)]
pub struct SegmentCollection {
    order: Vec<SegmentId>,
    by_id: HashMap<SegmentId, Segment>,
}

impl SegmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment. A repeated id replaces the earlier value but keeps its position.
    pub fn insert(&mut self, segment: Segment) {
        if !self.by_id.contains_key(&segment.id) {
            self.order.push(segment.id);
        }
        self.by_id.insert(segment.id, segment);
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: SegmentId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Segment ids in transcription order.
    pub fn ids(&self) -> &[SegmentId] {
        &self.order
    }

    /// Segments in transcription order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Segments sorted by ascending id.
    pub fn sorted_by_id(&self) -> Vec<&Segment> {
        let mut segments: Vec<&Segment> = self.by_id.values().collect();
        segments.sort_by_key(|s| s.id);
        segments
    }

    /// Render the whole transcript as `[start - end] text` blocks, ordered by id.
    pub fn full_transcript(&self) -> String {
        self.sorted_by_id()
            .into_iter()
            .map(|s| {
                format!(
                    "[{} - {}] {}\n\n",
                    crate::search::format_time(s.start),
                    crate::search::format_time(s.end),
                    s.text
                )
            })
            .collect()
    }
}

impl FromIterator<Segment> for SegmentCollection {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut collection = SegmentCollection::new();
        for segment in iter {
            collection.insert(segment);
        }
        collection
    }
}

/// Build a segment collection from raw transcription output.
///
/// Missing or empty record lists give an empty collection; malformed records
/// are skipped. An empty result means the upload has nothing to index.
pub fn extract_segments(raw: &RawTranscription) -> SegmentCollection {
    let Some(records) = raw.segments.as_ref() else {
        debug!("Transcription has no segment records");
        return SegmentCollection::new();
    };

    let mut skipped = 0usize;
    let collection: SegmentCollection = records
        .iter()
        .filter_map(|record| {
            let segment = Segment::from_raw(record);
            if segment.is_none() {
                skipped += 1;
            }
            segment
        })
        .collect();

    if skipped > 0 {
        warn!("Skipped {} malformed segment record(s)", skipped);
    }
    debug!("Extracted {} segments", collection.len());

    collection
}
