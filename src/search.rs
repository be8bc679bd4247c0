//! Cosine-similarity ranking of indexed segments against a query.

use crate::embedding::Embedder;
use crate::error::{Result, SpolError};
use crate::index::EmbeddingIndex;
use crate::segments::{SegmentCollection, SegmentId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, instrument};

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: SegmentId,
    pub text: String,
    /// Formatted start time ("m:ss").
    pub start: String,
    /// Formatted end time ("m:ss").
    pub end: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ, either vector has zero magnitude, or
/// the result is not a finite number.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a * norm_b);
    if similarity.is_finite() {
        // + 0.0 turns -0.0 into 0.0
        similarity.clamp(-1.0, 1.0) + 0.0
    } else {
        0.0
    }
}

/// Format seconds as `m:ss`, truncating fractional seconds.
///
/// Minutes are not padded and may exceed 59: `125.7` gives `"2:05"`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Positions of the `top_k` best scores, highest first.
///
/// Equal scores keep their original order.
pub fn rank(scores: &[f32], top_k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // sort_by is stable, so ties stay in index order. partial_cmp keeps
    // 0.0 and -0.0 equal, which total_cmp would not.
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order.truncate(top_k);
    order
}

/// Score every indexed vector against an already-embedded query.
pub fn rank_vector(
    query_vector: &[f32],
    segments: &SegmentCollection,
    index: &EmbeddingIndex,
    top_k: usize,
) -> Result<Vec<QueryResult>> {
    if index.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    if query_vector.len() != index.dimensions() {
        return Err(SpolError::Search(format!(
            "Query embedding has {} dimensions but the index has {}",
            query_vector.len(),
            index.dimensions()
        )));
    }

    let scores: Vec<f32> = index
        .vectors()
        .iter()
        .map(|v| cosine_similarity(query_vector, v))
        .collect();

    rank(&scores, top_k)
        .into_iter()
        .map(|pos| {
            let id = index.ids()[pos];
            let segment = segments.get(id).ok_or_else(|| {
                SpolError::Search(format!("Indexed segment {} is missing from the transcript", id))
            })?;
            Ok(QueryResult {
                id,
                text: segment.text.clone(),
                start: format_time(segment.start),
                end: format_time(segment.end),
                score: scores[pos],
            })
        })
        .collect()
}

/// Embed `query` and return the `top_k` most similar segments.
///
/// The embedder must be the one that built `index`.
#[instrument(skip(segments, index, embedder), fields(indexed = index.len()))]
pub async fn search(
    query: &str,
    segments: &SegmentCollection,
    index: &EmbeddingIndex,
    embedder: &dyn Embedder,
    top_k: usize,
) -> Result<Vec<QueryResult>> {
    if index.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let query_vector = embedder.embed(query).await?;
    let results = rank_vector(&query_vector, segments, index, top_k)?;

    debug!("Returning {} results", results.len());
    Ok(results)
}
