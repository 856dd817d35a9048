//! Embedding generation
//!
//! This module provides:
//! - A trait over embedding services
//! - An Ollama client
//! - Batch processing for ingestion

mod ollama;

pub use ollama::*;

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; output order matches input order
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embeddings returned".to_string()))
    }

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create the embedder described by the configuration
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    let embedder = OllamaEmbedder::new(&config.embedding, config.store.dimension)?;
    Ok(Box::new(embedder))
}

/// Embed texts `batch_size` at a time, preserving order
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size.max(1)) {
        let embeddings = embedder.embed(batch.to_vec()).await?;
        if embeddings.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                embeddings.len()
            )));
        }
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}
