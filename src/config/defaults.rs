//! Default values for configuration

use crate::store::DistanceMetric;

/// Embedding dimension of snowflake-arctic-embed:l
pub fn default_store_dimension() -> usize {
    1024
}

pub fn default_store_metric() -> DistanceMetric {
    DistanceMetric::Cosine
}

/// Default Ollama URL for local development
pub fn default_embedding_url() -> String {
    std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "snowflake-arctic-embed:l".to_string()
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    60
}

/// Chunks shorter than this (after trimming) are not embedded
pub fn default_embedding_min_chars() -> usize {
    10
}

/// Default token budget per chunk
pub fn default_chunk_max_tokens() -> usize {
    512
}

pub fn default_chunk_chars_per_token() -> usize {
    4
}

/// First-section prose longer than this stays out of the summary
pub fn default_summary_intro_max_chars() -> usize {
    500
}

/// Default number of query results
pub fn default_query_limit() -> usize {
    5
}

/// Default maximum query results
pub fn default_query_max_limit() -> usize {
    20
}

pub fn default_query_hybrid() -> bool {
    true
}

/// Default clone depth for git sources
pub fn default_git_depth() -> u32 {
    1
}
