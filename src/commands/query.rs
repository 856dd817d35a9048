//! Query command implementation

use crate::chunk::ChunkLevel;
use crate::config::Config;
use crate::embed::Embedder;
use crate::error::Result;
use crate::rank::{RetrievalEngine, RRF_K};
use crate::store::{SearchResult, Store};
use serde::Serialize;
use tracing::{debug, info};

/// Query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Restrict results to one topic
    pub topic: Option<String>,
    /// Number of results to return
    pub limit: Option<usize>,
    /// Skip lexical fusion
    pub vector_only: bool,
}

/// One ranked hit with display data
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub chunk_id: i64,
    pub level: ChunkLevel,
    pub title: String,
    pub content: String,
    pub breadcrumbs: Vec<String>,
    pub distance: f64,
    /// In [0, 1], higher is better
    pub relevance: f64,
    pub topic: Option<String>,
    pub source: Option<String>,
    pub path: Option<String>,
}

/// Query result for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub hybrid: bool,
    pub results: Vec<QueryHit>,
}

/// Relevance shown to users for a result distance
///
/// Vector distances map to `1 - distance`. Fused results report the fused
/// score as a share of the best attainable score (first in both lists).
pub fn relevance(distance: f64, hybrid: bool) -> f64 {
    let value = if hybrid {
        if distance <= 0.0 {
            return 0.0;
        }
        let best = 2.0 / (RRF_K + 1.0);
        (1.0 / distance) / best
    } else {
        1.0 - distance
    };
    value.clamp(0.0, 1.0)
}

/// Search the knowledge base for `text`
pub async fn cmd_query(
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
    text: &str,
    options: QueryOptions,
) -> Result<QueryResult> {
    info!("Querying: {}", text);

    let topic_id = match options.topic.as_deref().filter(|t| !t.is_empty()) {
        Some(name) => Some(store.get_topic_by_name(name).await?.id),
        None => None,
    };
    let limit = config.clamp_limit(options.limit);
    let hybrid = config.query.hybrid && !options.vector_only && !text.trim().is_empty();

    let embedding = embedder.embed_one(text).await?;
    let engine = RetrievalEngine::new(store.clone());
    let results = engine
        .search(&embedding, hybrid.then_some(text), topic_id, limit)
        .await?;
    debug!("Got {} results", results.len());

    let results = enrich(store, results, hybrid).await?;
    info!("Returning {} results", results.len());

    Ok(QueryResult {
        query: text.to_string(),
        hybrid,
        results,
    })
}

/// Attach origin data and relevance to raw search results
pub async fn enrich(
    store: &Store,
    results: Vec<SearchResult>,
    hybrid: bool,
) -> Result<Vec<QueryHit>> {
    let ids: Vec<i64> = results.iter().map(|r| r.chunk.id).collect();
    let mut origins = store.chunk_origins(&ids).await?;

    Ok(results
        .into_iter()
        .map(|r| {
            let origin = origins.remove(&r.chunk.id);
            QueryHit {
                chunk_id: r.chunk.id,
                level: r.chunk.level,
                breadcrumbs: r.chunk.breadcrumbs(),
                title: r.chunk.title,
                content: r.chunk.content,
                distance: r.distance,
                relevance: relevance(r.distance, hybrid),
                topic: origin.as_ref().map(|o| o.topic_name.clone()),
                source: origin.as_ref().map(|o| o.source_name.clone()),
                path: origin.map(|o| o.document_path),
            }
        })
        .collect())
}

/// Shorten to `max_chars` characters with an ellipsis
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Print query results to console
pub fn print_query_results(result: &QueryResult) {
    println!("\n🔍 Query: {}\n", result.query);

    if result.results.is_empty() {
        println!("No results found.");
        return;
    }

    println!("Found {} results:\n", result.results.len());

    for (i, hit) in result.results.iter().enumerate() {
        println!(
            "─── Result {} (relevance: {:.0}%) ───",
            i + 1,
            hit.relevance * 100.0
        );
        println!("Title: {}", hit.title);
        println!("Level: {}", hit.level);
        if !hit.breadcrumbs.is_empty() {
            println!("Section: {}", hit.breadcrumbs.join(" > "));
        }
        if let (Some(source), Some(path)) = (&hit.source, &hit.path) {
            println!("From: {} / {}", source, path);
        }
        println!("\n{}\n", truncate(&hit.content, 500));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkLevel;
    use crate::embed::tests::FakeEmbedder;
    use crate::store::tests::{add_chunk, seed_document, setup_store, DIM};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.store.dimension = DIM;
        config
    }

    #[test]
    fn test_relevance() {
        assert!((relevance(0.25, false) - 0.75).abs() < 1e-9);
        assert_eq!(relevance(1.5, false), 0.0);

        let best = 1.0 / (2.0 / 61.0);
        assert!((relevance(best, true) - 1.0).abs() < 1e-9);
        let single = 61.0;
        assert!((relevance(single, true) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[tokio::test]
    async fn test_query_with_topic_filter() {
        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);

        let go = seed_document(&store, "go", "go.md").await;
        let py = seed_document(&store, "python", "py.md").await;
        let go_chunk = add_chunk(&store, go.id, None, ChunkLevel::Summary, "channels").await;
        let py_chunk = add_chunk(&store, py.id, None, ChunkLevel::Summary, "channels").await;
        for chunk in [&go_chunk, &py_chunk] {
            store
                .store_embedding(chunk.id, &embedder.vector_for(&chunk.content))
                .await
                .unwrap();
        }

        let result = cmd_query(
            &config,
            &store,
            &embedder,
            "channels",
            QueryOptions {
                topic: Some("python".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(result.hybrid);
        assert_eq!(result.results.len(), 1);
        let hit = &result.results[0];
        assert_eq!(hit.chunk_id, py_chunk.id);
        assert_eq!(hit.topic.as_deref(), Some("python"));
        assert_eq!(hit.path.as_deref(), Some("py.md"));
    }

    #[tokio::test]
    async fn test_vector_only_reports_similarity() {
        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);
        let doc = seed_document(&store, "go", "go.md").await;
        let chunk = add_chunk(&store, doc.id, None, ChunkLevel::Summary, "goroutines").await;
        store
            .store_embedding(chunk.id, &embedder.vector_for("goroutines"))
            .await
            .unwrap();

        let result = cmd_query(
            &config,
            &store,
            &embedder,
            "goroutines",
            QueryOptions {
                vector_only: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!result.hybrid);
        assert!((result.results[0].relevance - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_unknown_topic() {
        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);

        let err = cmd_query(
            &config,
            &store,
            &embedder,
            "anything",
            QueryOptions {
                topic: Some("cobol".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
