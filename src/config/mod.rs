//! Configuration management for grimoire
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use crate::store::{DistanceMetric, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Vector index settings, fixed once the database is created
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Source fetching configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Embedding dimension shared by every stored vector
    #[serde(default = "default_store_dimension")]
    pub dimension: usize,

    /// Distance metric used by vector search
    #[serde(default = "default_store_metric")]
    pub metric: DistanceMetric,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Minimum trimmed length of chunk content worth embedding
    #[serde(default = "default_embedding_min_chars")]
    pub min_chars: usize,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Token budget per chunk
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,

    /// Characters per estimated token
    #[serde(default = "default_chunk_chars_per_token")]
    pub chars_per_token: usize,

    /// Upper bound on first-section prose folded into the summary
    #[serde(default = "default_summary_intro_max_chars")]
    pub summary_intro_max_chars: usize,
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Default number of results
    #[serde(default = "default_query_limit")]
    pub default_limit: usize,

    /// Maximum results allowed
    #[serde(default = "default_query_max_limit")]
    pub max_limit: usize,

    /// Fuse lexical results into vector results
    #[serde(default = "default_query_hybrid")]
    pub hybrid: bool,
}

/// Source fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Where git sources are checked out (defaults to `<base>/cache`)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Clone depth for git sources
    #[serde(default = "default_git_depth")]
    pub git_depth: u32,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for grimoire data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: default_store_dimension(),
            metric: default_store_metric(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            batch_size: default_embedding_batch_size(),
            timeout_secs: default_embedding_timeout(),
            min_chars: default_embedding_min_chars(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_chunk_max_tokens(),
            chars_per_token: default_chunk_chars_per_token(),
            summary_intro_max_chars: default_summary_intro_max_chars(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            max_limit: default_query_max_limit(),
            hybrid: default_query_hybrid(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            git_depth: default_git_depth(),
        }
    }
}

impl Config {
    /// Get the default base directory for grimoire (~/.grimoire)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".grimoire")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("grimoire.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("grimoire.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Directory that holds git checkouts
    pub fn cache_dir(&self) -> PathBuf {
        self.fetch
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("cache"))
    }

    /// Options the store is opened with
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            dimension: self.store.dimension,
            metric: self.store.metric,
            chars_per_token: self.chunk.chars_per_token,
        }
    }

    /// Clamp a requested result count into the configured range
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => self.query.default_limit,
            Some(n) => n.min(self.query.max_limit),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.dimension == 0 {
            return Err(Error::Config("store.dimension must be positive".to_string()));
        }

        if self.chunk.max_tokens == 0 {
            return Err(Error::Config("chunk.max_tokens must be positive".to_string()));
        }

        if self.chunk.chars_per_token == 0 {
            return Err(Error::Config(
                "chunk.chars_per_token must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.query.default_limit > self.query.max_limit {
            return Err(Error::Config(
                "query.default_limit must be <= query.max_limit".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.dimension, 1024);
        assert_eq!(config.store.metric, DistanceMetric::Cosine);
        assert_eq!(config.chunk.max_tokens, 512);
        assert_eq!(config.embedding.model, "snowflake-arctic-embed:l");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.chunk.max_tokens = 256;
        config.store.metric = DistanceMetric::L2;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.chunk.max_tokens, 256);
        assert_eq!(loaded.store.metric, DistanceMetric::L2);
        assert_eq!(loaded.paths.db_file, tmp.path().join("grimoire.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[query]\nmax_limit = 50\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.query.max_limit, 50);
        assert_eq!(loaded.query.default_limit, 5);
        assert_eq!(loaded.chunk.chars_per_token, 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.chunk.max_tokens = 0;
        assert!(config.validate().is_err());
        config.chunk.max_tokens = 128;
        assert!(config.validate().is_ok());

        config.query.default_limit = config.query.max_limit + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_limit() {
        let config = Config::default();
        assert_eq!(config.clamp_limit(None), 5);
        assert_eq!(config.clamp_limit(Some(0)), 5);
        assert_eq!(config.clamp_limit(Some(7)), 7);
        assert_eq!(config.clamp_limit(Some(500)), 20);
    }
}
