//! Hybrid retrieval
//!
//! This module handles:
//! - Pure vector search when no query text is available
//! - Reciprocal Rank Fusion of vector and lexical rankings
//! - Deterministic ordering of equal fused scores

use crate::error::Result;
use crate::store::{Chunk, ChunkId, SearchResult, Store, TopicId};
use std::collections::HashMap;
use tracing::debug;

/// Rank offset damping the weight of top positions in each list
pub const RRF_K: f64 = 60.0;

/// Search front door over a [`Store`]
#[derive(Clone)]
pub struct RetrievalEngine {
    store: Store,
}

impl RetrievalEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Best `limit` chunks for a query, lower distance first
    ///
    /// With non-blank `text` the vector and lexical rankings are fused and
    /// the reported distance is `1 / fused score`. Otherwise the vector
    /// ranking is returned untouched.
    pub async fn search(
        &self,
        embedding: &[f32],
        text: Option<&str>,
        topic: Option<TopicId>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let text = text.map(str::trim).filter(|t| !t.is_empty());

        let Some(text) = text else {
            return self.store.search_vector_scored(embedding, topic, limit).await;
        };

        let vector = self.store.search_vector(embedding, topic, limit).await?;
        let lexical: Vec<Chunk> = self
            .store
            .search_lexical(text, topic, limit)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect();

        debug!(
            "Fusing {} vector and {} lexical results",
            vector.len(),
            lexical.len()
        );

        Ok(reciprocal_rank_fusion(&[vector, lexical], limit))
    }
}

/// Fuse ranked lists; each position `r` (1-based) adds `1 / (RRF_K + r)`
///
/// Chunks are identified by id. Output is sorted by fused score descending,
/// ties by ascending chunk id, and cut to `limit`.
pub fn reciprocal_rank_fusion(lists: &[Vec<Chunk>], limit: usize) -> Vec<SearchResult> {
    let mut scores: HashMap<ChunkId, (f64, &Chunk)> = HashMap::new();

    for list in lists {
        for (idx, chunk) in list.iter().enumerate() {
            let contribution = 1.0 / (RRF_K + (idx + 1) as f64);
            scores
                .entry(chunk.id)
                .and_modify(|(score, _)| *score += contribution)
                .or_insert((contribution, chunk));
        }
    }

    let mut fused: Vec<(f64, &Chunk)> = scores.into_values().collect();
    fused.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.id.cmp(&b.1.id)));
    fused.truncate(limit);

    fused
        .into_iter()
        .map(|(score, chunk)| SearchResult {
            chunk: chunk.clone(),
            distance: 1.0 / score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkLevel;
    use crate::store::tests::{add_chunk, seed_document, setup_store};

    fn chunk(id: ChunkId) -> Chunk {
        Chunk {
            id,
            document_id: 1,
            parent_chunk_id: None,
            level: ChunkLevel::Paragraph,
            title: String::new(),
            content: format!("chunk {}", id),
            token_count: 2,
            breadcrumbs_json: None,
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<ChunkId> {
        results.iter().map(|r| r.chunk.id).collect()
    }

    #[test]
    fn test_swapped_ranks_tie_break_by_id() {
        let vector = vec![chunk(7), chunk(3)];
        let lexical = vec![chunk(3), chunk(7)];

        let fused = reciprocal_rank_fusion(&[vector, lexical], 10);
        assert_eq!(ids(&fused), vec![3, 7]);

        let expected = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((1.0 / fused[0].distance - expected).abs() < 1e-12);
        assert_eq!(fused[0].distance, fused[1].distance);
    }

    #[test]
    fn test_single_list_match_ranks_below_shared() {
        // C tops the vector list but is absent from the lexical list
        let vector = vec![chunk(30), chunk(10), chunk(20)];
        let lexical = vec![chunk(10), chunk(20)];

        let fused = reciprocal_rank_fusion(&[vector, lexical], 10);
        assert_eq!(ids(&fused), vec![10, 20, 30]);
        assert!((1.0 / fused[2].distance - 1.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn test_fusion_truncates_and_is_deterministic() {
        let vector: Vec<Chunk> = (1..=5).map(chunk).collect();
        let lexical: Vec<Chunk> = (4..=8).rev().map(chunk).collect();

        let first = reciprocal_rank_fusion(&[vector.clone(), lexical.clone()], 3);
        let second = reciprocal_rank_fusion(&[vector, lexical], 3);
        assert_eq!(first.len(), 3);
        assert_eq!(ids(&first), ids(&second));
        assert!(first.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_fusion_of_empty_lists() {
        assert!(reciprocal_rank_fusion(&[vec![], vec![]], 5).is_empty());
    }

    #[tokio::test]
    async fn test_blank_text_returns_vector_ordering() {
        let (store, _tmp) = setup_store().await;
        let doc = seed_document(&store, "go", "a.md").await;
        let a = add_chunk(&store, doc.id, None, ChunkLevel::Summary, "alpha").await;
        let b = add_chunk(&store, doc.id, Some(a.id), ChunkLevel::Section, "beta").await;
        store.store_embedding(a.id, &[0.0, 1.0, 0.0]).await.unwrap();
        store.store_embedding(b.id, &[1.0, 0.0, 0.0]).await.unwrap();

        let engine = RetrievalEngine::new(store.clone());
        let query = [1.0, 0.1, 0.0];
        let expected = store.search_vector_scored(&query, None, 5).await.unwrap();

        for text in [None, Some(""), Some("   ")] {
            let results = engine.search(&query, text, None, 5).await.unwrap();
            assert_eq!(results, expected);
        }
        assert_eq!(ids(&expected), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_hybrid_boosts_lexical_match() {
        let (store, _tmp) = setup_store().await;
        let doc = seed_document(&store, "go", "a.md").await;
        let summary = add_chunk(&store, doc.id, None, ChunkLevel::Summary, "overview").await;
        let near = add_chunk(&store, doc.id, Some(summary.id), ChunkLevel::Section, "slices").await;
        let keyword = add_chunk(
            &store,
            doc.id,
            Some(summary.id),
            ChunkLevel::Section,
            "defer statements run at function exit",
        )
        .await;
        store.store_embedding(near.id, &[1.0, 0.0, 0.0]).await.unwrap();
        store.store_embedding(keyword.id, &[0.8, 0.6, 0.0]).await.unwrap();
        store.store_embedding(summary.id, &[0.0, 0.0, 1.0]).await.unwrap();

        let engine = RetrievalEngine::new(store);
        let results = engine
            .search(&[1.0, 0.0, 0.0], Some("defer"), None, 3)
            .await
            .unwrap();

        // second by vector, only lexical hit: 1/62 + 1/61 beats 1/61
        assert_eq!(results[0].chunk.id, keyword.id);
        assert_eq!(results[1].chunk.id, near.id);
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_hybrid_respects_topic_filter() {
        let (store, _tmp) = setup_store().await;
        let go_doc = seed_document(&store, "go", "go.md").await;
        let py_doc = seed_document(&store, "python", "py.md").await;
        let go_chunk = add_chunk(&store, go_doc.id, None, ChunkLevel::Summary, "iterators").await;
        let py_chunk = add_chunk(&store, py_doc.id, None, ChunkLevel::Summary, "iterators").await;
        store.store_embedding(go_chunk.id, &[1.0, 0.0, 0.0]).await.unwrap();
        store.store_embedding(py_chunk.id, &[1.0, 0.0, 0.0]).await.unwrap();

        let py = store.get_topic_by_name("python").await.unwrap();
        let results = store
            .search_hybrid(&[1.0, 0.0, 0.0], "iterators", Some(py.id), 10)
            .await
            .unwrap();

        assert_eq!(ids(&results), vec![py_chunk.id]);
    }

    #[tokio::test]
    async fn test_empty_corpus_is_not_an_error() {
        let (store, _tmp) = setup_store().await;
        let engine = RetrievalEngine::new(store);

        let results = engine
            .search(&[1.0, 0.0, 0.0], Some("anything"), None, 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
