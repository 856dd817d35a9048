//! Stats and listing commands

use crate::config::Config;
use crate::error::Result;
use crate::store::{Source, Store, StoreStats, Topic};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Store overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsInfo {
    pub db_path: String,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: String,
    pub counts: StoreStats,
}

pub async fn cmd_stats(config: &Config, store: &Store) -> Result<StatsInfo> {
    info!("Getting stats");

    Ok(StatsInfo {
        db_path: config.paths.db_file.display().to_string(),
        embedding_model: config.embedding.model.clone(),
        dimension: store.dimension(),
        metric: store.metric().to_string(),
        counts: store.get_stats().await?,
    })
}

pub fn print_stats(stats: &StatsInfo) {
    println!("\n📊 grimoire Stats\n");
    println!("Database: {}", stats.db_path);
    println!(
        "Embeddings: {} ({} dims, {})",
        stats.embedding_model, stats.dimension, stats.metric
    );
    println!();
    println!("  Topics: {}", stats.counts.topic_count);
    println!("  Sources: {}", stats.counts.source_count);
    println!("  Documents: {}", stats.counts.document_count);
    println!("  Chunks: {}", stats.counts.chunk_count);
    println!("  Embeddings: {}", stats.counts.embedding_count);
}

pub async fn cmd_list_topics(store: &Store) -> Result<Vec<Topic>> {
    info!("Listing topics");
    store.list_topics().await
}

pub fn print_topics(topics: &[Topic]) {
    println!("\n📚 Topics\n");

    if topics.is_empty() {
        println!("No topics yet. Use 'grimoire ingest <manifest>' to add one.");
        return;
    }

    for topic in topics {
        println!("• {} ({})", topic.display_name, topic.name);
    }
}

/// Source with the topic it belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub topic: String,
    #[serde(flatten)]
    pub source: Source,
}

/// List sources, optionally for a single topic name
pub async fn cmd_list_sources(store: &Store, topic: Option<&str>) -> Result<Vec<SourceInfo>> {
    info!("Listing sources");

    let topics = store.list_topics().await?;
    let filter = match topic.filter(|t| !t.is_empty()) {
        Some(name) => Some(store.get_topic_by_name(name).await?.id),
        None => None,
    };

    let sources = store.list_sources(filter).await?;
    Ok(sources
        .into_iter()
        .map(|source| SourceInfo {
            topic: topics
                .iter()
                .find(|t| t.id == source.topic_id)
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            source,
        })
        .collect())
}

pub fn print_sources(sources: &[SourceInfo]) {
    println!("\n📚 Sources\n");

    if sources.is_empty() {
        println!("No sources registered.");
        return;
    }

    for info in sources {
        println!("• {} [{}] ({})", info.source.name, info.source.kind, info.topic);
        println!("  URL: {}", info.source.url);
        println!("  Created: {}", info.source.created_at);
        println!();
    }
}
