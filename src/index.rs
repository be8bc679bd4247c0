//! In-memory embedding index over a segment collection.

use crate::embedding::Embedder;
use crate::error::{Result, SpolError};
use crate::segments::{SegmentCollection, SegmentId};
use tracing::{debug, info, instrument};

/// Parallel arrays of segment ids and their embedding vectors.
///
/// `vectors[i]` embeds the text of segment `ids[i]`; every vector has
/// `dimensions` components.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    ids: Vec<SegmentId>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl EmbeddingIndex {
    /// Assemble an index from parallel arrays, checking their shape.
    pub fn from_parts(ids: Vec<SegmentId>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if ids.len() != vectors.len() {
            return Err(SpolError::Embedding(format!(
                "Got {} vectors for {} segments",
                vectors.len(),
                ids.len()
            )));
        }

        let dimensions = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some(pos) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(SpolError::Embedding(format!(
                "Vector for segment {} has {} dimensions, expected {}",
                ids[pos],
                vectors[pos].len(),
                dimensions
            )));
        }

        Ok(Self {
            ids,
            vectors,
            dimensions,
        })
    }

    pub fn ids(&self) -> &[SegmentId] {
        &self.ids
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Dimensionality of the indexed vectors (0 for an empty index).
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Embed every segment of `segments`, in collection order.
///
/// Texts are sent to the embedder `batch_size` at a time. Any failure aborts
/// the whole build; no partial index is ever returned.
#[instrument(skip(segments, embedder), fields(segments = segments.len()))]
pub async fn build_index(
    segments: &SegmentCollection,
    embedder: &dyn Embedder,
    batch_size: usize,
) -> Result<EmbeddingIndex> {
    let ids: Vec<SegmentId> = segments.ids().to_vec();
    let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();

    if ids.is_empty() {
        debug!("No segments to embed, returning empty index");
        return Ok(EmbeddingIndex::default());
    }

    info!("Creating embeddings for {} segments", ids.len());

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(SpolError::Embedding(format!(
                "Embedder returned {} vectors for a batch of {}",
                embedded.len(),
                batch.len()
            )));
        }
        vectors.extend(embedded);
    }

    let index = EmbeddingIndex::from_parts(ids, vectors)?;
    debug!("Built index with {} dimensions", index.dimensions());

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::segments::Segment;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn collection(texts: &[&str]) -> SegmentCollection {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                id: (i as i64) * 10,
                start: i as f64,
                end: i as f64 + 1.0,
                text: text.to_string(),
            })
            .collect()
    }

    /// Fails on the batch containing the given text.
    struct FailingEmbedder {
        poison: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t == self.poison) {
                return Err(SpolError::Embedding("model crashed".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Returns one vector too few.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_index_shape() {
        let segments = collection(&["alpha", "beta", "gamma"]);
        let embedder = HashingEmbedder::new(32);

        let index = build_index(&segments, &embedder, 2).await.unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.ids().len(), index.vectors().len());
        assert_eq!(index.ids(), segments.ids());
        assert!(index.ids().iter().all(|id| segments.contains(*id)));
        assert_eq!(index.dimensions(), 32);
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_output() {
        let segments = collection(&["one", "two", "three", "four", "five"]);
        let embedder = HashingEmbedder::new(16);

        let a = build_index(&segments, &embedder, 1).await.unwrap();
        let b = build_index(&segments, &embedder, 32).await.unwrap();

        assert_eq!(a.ids(), b.ids());
        assert_eq!(a.vectors(), b.vectors());
    }

    #[tokio::test]
    async fn test_empty_collection_gives_empty_index() {
        let index = build_index(&SegmentCollection::new(), &HashingEmbedder::new(8), 4)
            .await
            .unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 0);
    }

    #[tokio::test]
    async fn test_failure_in_later_batch_fails_whole_build() {
        let segments = collection(&["ok", "fine", "boom"]);
        let embedder = FailingEmbedder {
            poison: "boom",
            calls: AtomicUsize::new(0),
        };

        let result = build_index(&segments, &embedder, 2).await;

        assert!(matches!(result, Err(SpolError::Embedding(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_short_batch_rejected() {
        let segments = collection(&["a", "b"]);
        let result = build_index(&segments, &ShortEmbedder, 8).await;
        assert!(matches!(result, Err(SpolError::Embedding(_))));
    }

    #[test]
    fn test_from_parts_rejects_ragged_vectors() {
        let result = EmbeddingIndex::from_parts(vec![1, 2], vec![vec![1.0, 0.0], vec![1.0]]);
        assert!(matches!(result, Err(SpolError::Embedding(_))));

        let result = EmbeddingIndex::from_parts(vec![1, 2], vec![vec![1.0]]);
        assert!(result.is_err());
    }
}
