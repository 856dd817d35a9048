//! Knowledge base storage using SQLite
//!
//! One database file holds:
//! - Topics, sources, documents and chunks
//! - A full-text index over chunks, maintained by triggers
//! - Chunk embeddings, searched exactly with the configured metric
//!
//! The embedding dimension and metric are recorded on first open and checked
//! on every later open.

mod schema;
mod vector;

pub use schema::*;
pub use vector::*;

use crate::chunk::{estimate_tokens, ChunkLevel};
use crate::error::{Error, Result};
use crate::rank::RetrievalEngine;
use chrono::Utc;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub type TopicId = i64;
pub type SourceId = i64;
pub type DocumentId = i64;
pub type ChunkId = i64;

/// Kind of documentation origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "git")]
    Repository,
    Web,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Repository => "repository",
            SourceKind::Web => "web",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "repository" | "git" => Ok(SourceKind::Repository),
            "web" => Ok(SourceKind::Web),
            _ => Err(Error::InvalidInput(format!("Unknown source kind: {}", s))),
        }
    }
}

impl TryFrom<String> for SourceKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A topic namespace (one per language)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
    pub display_name: String,
    pub created_at: String,
}

/// A documentation origin within a topic
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub topic_id: TopicId,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub kind: SourceKind,
    pub url: String,
    pub created_at: String,
}

/// A fetched file or page
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_id: SourceId,
    pub path: String,
    pub title: String,
    pub indexed_at: String,
}

/// A persisted chunk
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub parent_chunk_id: Option<ChunkId>,
    #[sqlx(try_from = "String")]
    pub level: ChunkLevel,
    pub title: String,
    pub content: String,
    pub token_count: i64,
    pub breadcrumbs_json: Option<String>,
}

impl Chunk {
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.breadcrumbs_json
            .as_ref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default()
    }
}

/// Input for [`Store::create_chunk`]; the token count is computed on write
#[derive(Debug, Clone)]
pub struct NewChunk<'a> {
    pub document_id: DocumentId,
    pub parent_chunk_id: Option<ChunkId>,
    pub level: ChunkLevel,
    pub title: &'a str,
    pub content: &'a str,
    pub breadcrumbs: &'a [String],
}

/// A chunk with its distance to the query; lower is better
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f64,
}

/// A full-text match with its bm25 rank (more negative is better)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LexicalHit {
    #[sqlx(flatten)]
    pub chunk: Chunk,
    pub score: f64,
}

/// Where a chunk came from, for display
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkOrigin {
    pub chunk_id: ChunkId,
    pub document_path: String,
    pub document_title: String,
    pub source_name: String,
    pub source_url: String,
    pub topic_name: String,
}

/// Row counts for diagnostics
#[derive(Debug, Clone, Default, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StoreStats {
    pub topic_count: i64,
    pub source_count: i64,
    pub document_count: i64,
    pub chunk_count: i64,
    pub embedding_count: i64,
}

/// Settings the store is opened with
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub chars_per_token: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dimension: 1024,
            metric: DistanceMetric::Cosine,
            chars_per_token: 4,
        }
    }
}

/// Ids of a chunk and everything below it
const SUBTREE_CTE: &str = r#"
WITH RECURSIVE subtree(id) AS (
    SELECT id FROM chunks WHERE id = ?1
    UNION ALL
    SELECT c.id FROM chunks c JOIN subtree s ON c.parent_chunk_id = s.id
)
"#;

/// Quote each term so FTS5 operators in user text are taken literally
pub fn sanitize_fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Replace the raw constraint message on a conflict with something readable
fn describe_conflict(err: Error, what: impl FnOnce() -> String) -> Error {
    match err {
        Error::Conflict(_) => Error::Conflict(what()),
        other => other,
    }
}

/// Knowledge base handle
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    options: StoreOptions,
}

impl Store {
    /// Open (creating if needed) the database at `path`
    pub async fn open(path: &Path, options: StoreOptions) -> Result<Self> {
        if options.dimension == 0 {
            return Err(Error::InvalidInput(
                "embedding dimension must be positive".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connect = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        debug!("Connecting to SQLite database at {:?}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect)
            .await?;

        let store = Self { pool, options };
        store.init_schema().await?;
        store.check_vector_settings().await?;
        Ok(store)
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    pub fn dimension(&self) -> usize {
        self.options.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.options.metric
    }

    /// Transaction holding the write lock from its first statement
    ///
    /// Concurrent writers queue on the busy timeout instead of failing to
    /// upgrade a read lock.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn init_schema(&self) -> Result<()> {
        if !self.is_initialized().await? {
            info!("Initializing database schema");
        }
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='chunks'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    /// Record dimension and metric on first open; refuse a mismatch afterwards
    async fn check_vector_settings(&self) -> Result<()> {
        let wanted = [
            ("dimension", self.options.dimension.to_string()),
            ("metric", self.options.metric.to_string()),
        ];

        for (key, value) in &wanted {
            sqlx::query("INSERT OR IGNORE INTO store_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&self.pool)
                .await?;

            let (stored,): (String,) = sqlx::query_as("SELECT value FROM store_meta WHERE key = ?")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;

            if &stored != value {
                return Err(Error::InvalidInput(format!(
                    "store was created with {} {} but {} is configured; a full reindex is required",
                    key, stored, value
                )));
            }
        }

        Ok(())
    }

    // ===== Topic Operations =====

    pub async fn create_topic(&self, name: &str, display_name: &str) -> Result<Topic> {
        require_non_empty("topic name", name)?;
        let display_name = if display_name.trim().is_empty() {
            name
        } else {
            display_name
        };
        let now = Utc::now().to_rfc3339();

        let result =
            sqlx::query("INSERT INTO topics (name, display_name, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(display_name)
                .bind(&now)
                .execute(&self.pool)
                .await
                .map_err(|e| describe_conflict(e.into(), || format!("topic '{}'", name)))?;

        Ok(Topic {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            created_at: now,
        })
    }

    pub async fn get_topic_by_name(&self, name: &str) -> Result<Topic> {
        sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("topic '{}'", name)))
    }

    pub async fn list_topics(&self) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>("SELECT * FROM topics ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(topics)
    }

    // ===== Source Operations =====

    pub async fn create_source(
        &self,
        topic_id: TopicId,
        name: &str,
        kind: SourceKind,
        url: &str,
    ) -> Result<Source> {
        require_non_empty("source name", name)?;
        require_non_empty("source url", url)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            INSERT INTO sources (topic_id, name, kind, url, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(topic_id)
        .bind(name)
        .bind(kind.as_str())
        .bind(url)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| describe_conflict(e.into(), || format!("source '{}'", name)))?;

        Ok(Source {
            id: result.last_insert_rowid(),
            topic_id,
            name: name.to_string(),
            kind,
            url: url.to_string(),
            created_at: now,
        })
    }

    pub async fn get_source_by_name(&self, topic_id: TopicId, name: &str) -> Result<Source> {
        sqlx::query_as::<_, Source>("SELECT * FROM sources WHERE topic_id = ? AND name = ?")
            .bind(topic_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source '{}'", name)))
    }

    /// List sources, optionally restricted to one topic
    pub async fn list_sources(&self, topic: Option<TopicId>) -> Result<Vec<Source>> {
        let sources = sqlx::query_as::<_, Source>(
            "SELECT * FROM sources WHERE (?1 IS NULL OR topic_id = ?1) ORDER BY name, id",
        )
        .bind(topic)
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    // ===== Document Operations =====

    pub async fn create_document(
        &self,
        source_id: SourceId,
        path: &str,
        title: &str,
    ) -> Result<Document> {
        require_non_empty("document path", path)?;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO documents (source_id, path, title, indexed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(source_id)
        .bind(path)
        .bind(title)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| describe_conflict(e.into(), || format!("document '{}'", path)))?;

        Ok(Document {
            id: result.last_insert_rowid(),
            source_id,
            path: path.to_string(),
            title: title.to_string(),
            indexed_at: now,
        })
    }

    pub async fn get_document_by_path(&self, source_id: SourceId, path: &str) -> Result<Document> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE source_id = ? AND path = ?")
            .bind(source_id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document '{}'", path)))
    }

    /// Delete a document with its chunks and embeddings; returns chunks removed
    pub async fn delete_document(&self, id: DocumentId) -> Result<u64> {
        let mut tx = self.begin_write().await?;

        sqlx::query(
            "DELETE FROM chunk_embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE document_id = ?)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let chunks = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let documents = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if documents == 0 {
            return Err(Error::NotFound(format!("document {}", id)));
        }

        tx.commit().await?;
        debug!("Deleted document {} with {} chunks", id, chunks);
        Ok(chunks)
    }

    // ===== Chunk Operations =====

    /// Insert a chunk after checking its parent link
    ///
    /// A summary has no parent, a section hangs off a summary and a paragraph
    /// off a section, always within the same document.
    pub async fn create_chunk(&self, chunk: &NewChunk<'_>) -> Result<Chunk> {
        let mut tx = self.begin_write().await?;

        match (chunk.level.parent_level(), chunk.parent_chunk_id) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(Error::InvalidInput(
                    "summary chunks cannot have a parent".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(Error::InvalidInput(format!(
                    "{} chunk requires a parent",
                    chunk.level
                )));
            }
            (Some(expected), Some(parent_id)) => {
                let parent: Option<(DocumentId, String)> =
                    sqlx::query_as("SELECT document_id, level FROM chunks WHERE id = ?")
                        .bind(parent_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                let Some((parent_document, parent_level)) = parent else {
                    return Err(Error::InvalidInput(format!(
                        "parent chunk {} does not exist",
                        parent_id
                    )));
                };
                if parent_document != chunk.document_id {
                    return Err(Error::InvalidInput(format!(
                        "parent chunk {} belongs to another document",
                        parent_id
                    )));
                }
                let parent_level: ChunkLevel = parent_level.parse()?;
                if parent_level != expected {
                    return Err(Error::InvalidInput(format!(
                        "{} chunk cannot hang off a {} chunk",
                        chunk.level, parent_level
                    )));
                }
            }
        }

        let token_count = estimate_tokens(chunk.content, self.options.chars_per_token) as i64;
        let breadcrumbs_json = if chunk.breadcrumbs.is_empty() {
            None
        } else {
            Some(serde_json::to_string(chunk.breadcrumbs)?)
        };

        let result = sqlx::query(
            r#"
            INSERT INTO chunks (document_id, parent_chunk_id, level, title, content, token_count, breadcrumbs_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(chunk.document_id)
        .bind(chunk.parent_chunk_id)
        .bind(chunk.level.as_str())
        .bind(chunk.title)
        .bind(chunk.content)
        .bind(token_count)
        .bind(&breadcrumbs_json)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Chunk {
            id: result.last_insert_rowid(),
            document_id: chunk.document_id,
            parent_chunk_id: chunk.parent_chunk_id,
            level: chunk.level,
            title: chunk.title.to_string(),
            content: chunk.content.to_string(),
            token_count,
            breadcrumbs_json,
        })
    }

    pub async fn get_chunk(&self, id: ChunkId) -> Result<Chunk> {
        sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("chunk {}", id)))
    }

    /// Chunks of a document in creation order
    pub async fn list_document_chunks(&self, document_id: DocumentId) -> Result<Vec<Chunk>> {
        let chunks =
            sqlx::query_as::<_, Chunk>("SELECT * FROM chunks WHERE document_id = ? ORDER BY id")
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(chunks)
    }

    async fn get_chunks_by_ids(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, Chunk>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            "SELECT * FROM chunks WHERE id IN ({})",
            placeholders.join(",")
        );

        let mut query = sqlx::query_as::<_, Chunk>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let chunks = query.fetch_all(&self.pool).await?;
        Ok(chunks.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Delete a chunk, its descendants and their embeddings; returns chunks removed
    pub async fn delete_chunk(&self, id: ChunkId) -> Result<u64> {
        let delete_embeddings = format!(
            "{} DELETE FROM chunk_embeddings WHERE chunk_id IN (SELECT id FROM subtree)",
            SUBTREE_CTE
        );
        let delete_chunks = format!(
            "{} DELETE FROM chunks WHERE id IN (SELECT id FROM subtree)",
            SUBTREE_CTE
        );

        let mut tx = self.begin_write().await?;

        sqlx::query(&delete_embeddings)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query(&delete_chunks)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::NotFound(format!("chunk {}", id)));
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// Display data for a set of chunks
    pub async fn chunk_origins(&self, ids: &[ChunkId]) -> Result<HashMap<ChunkId, ChunkOrigin>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
        let sql = format!(
            r#"
            SELECT c.id AS chunk_id,
                   d.path AS document_path,
                   d.title AS document_title,
                   s.name AS source_name,
                   s.url AS source_url,
                   t.name AS topic_name
            FROM chunks c
            JOIN documents d ON d.id = c.document_id
            JOIN sources s ON s.id = d.source_id
            JOIN topics t ON t.id = s.topic_id
            WHERE c.id IN ({})
            "#,
            placeholders.join(",")
        );

        let mut query = sqlx::query_as::<_, ChunkOrigin>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let origins = query.fetch_all(&self.pool).await?;
        Ok(origins.into_iter().map(|o| (o.chunk_id, o)).collect())
    }

    // ===== Embedding Operations =====

    pub async fn store_embedding(&self, chunk_id: ChunkId, embedding: &[f32]) -> Result<()> {
        validate_embedding(embedding, self.options.dimension)?;

        sqlx::query("INSERT INTO chunk_embeddings (chunk_id, embedding) VALUES (?, ?)")
            .bind(chunk_id)
            .bind(encode_embedding(embedding))
            .execute(&self.pool)
            .await
            .map_err(|e| match Error::from(e) {
                Error::Conflict(_) => {
                    Error::Conflict(format!("embedding for chunk {}", chunk_id))
                }
                Error::InvalidInput(_) => {
                    Error::InvalidInput(format!("chunk {} does not exist", chunk_id))
                }
                other => other,
            })?;
        Ok(())
    }

    pub async fn get_embedding(&self, chunk_id: ChunkId) -> Result<Vec<f32>> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT embedding FROM chunk_embeddings WHERE chunk_id = ?")
                .bind(chunk_id)
                .fetch_optional(&self.pool)
                .await?;

        let (blob,) =
            row.ok_or_else(|| Error::NotFound(format!("embedding for chunk {}", chunk_id)))?;
        decode_embedding(&blob, self.options.dimension)
    }

    // ===== Search Operations =====

    /// Full-text search ranked by bm25, best first
    pub async fn search_lexical(
        &self,
        query: &str,
        topic: Option<TopicId>,
        limit: usize,
    ) -> Result<Vec<LexicalHit>> {
        let Some(match_expr) = sanitize_fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let hits = sqlx::query_as::<_, LexicalHit>(
            r#"
            SELECT c.*, bm25(chunks_fts) AS score
            FROM chunks_fts
            JOIN chunks c ON c.id = chunks_fts.rowid
            JOIN documents d ON d.id = c.document_id
            JOIN sources s ON s.id = d.source_id
            WHERE chunks_fts MATCH ?1
              AND (?2 IS NULL OR s.topic_id = ?2)
            ORDER BY score, c.id
            LIMIT ?3
            "#,
        )
        .bind(match_expr)
        .bind(topic)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(hits)
    }

    /// The `k` chunks nearest to `query`, nearest first
    ///
    /// Every embedding under the topic filter is scored, so a filter never
    /// shrinks the result below `k` while matching chunks remain.
    pub async fn search_vector_scored(
        &self,
        query: &[f32],
        topic: Option<TopicId>,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        validate_embedding(query, self.options.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut nearest = NearestNeighbors::new(k);
        let mut rows = sqlx::query_as::<_, (ChunkId, Vec<u8>)>(
            r#"
            SELECT e.chunk_id, e.embedding
            FROM chunk_embeddings e
            JOIN chunks c ON c.id = e.chunk_id
            JOIN documents d ON d.id = c.document_id
            JOIN sources s ON s.id = d.source_id
            WHERE ?1 IS NULL OR s.topic_id = ?1
            "#,
        )
        .bind(topic)
        .fetch(&self.pool);

        while let Some((chunk_id, blob)) = rows.try_next().await? {
            let vector = decode_embedding(&blob, self.options.dimension)?;
            nearest.push(chunk_id, self.options.metric.distance(query, &vector));
        }
        drop(rows);

        let ranked = nearest.into_sorted();
        let ids: Vec<ChunkId> = ranked.iter().map(|(id, _)| *id).collect();
        let mut chunks = self.get_chunks_by_ids(&ids).await?;

        Ok(ranked
            .into_iter()
            .filter_map(|(id, distance)| {
                chunks.remove(&id).map(|chunk| SearchResult {
                    chunk,
                    distance: f64::from(distance),
                })
            })
            .collect())
    }

    /// Like [`Store::search_vector_scored`] without distances
    pub async fn search_vector(
        &self,
        query: &[f32],
        topic: Option<TopicId>,
        k: usize,
    ) -> Result<Vec<Chunk>> {
        Ok(self
            .search_vector_scored(query, topic, k)
            .await?
            .into_iter()
            .map(|r| r.chunk)
            .collect())
    }

    /// Vector and lexical results fused by the retrieval engine
    pub async fn search_hybrid(
        &self,
        query: &[f32],
        text: &str,
        topic: Option<TopicId>,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        RetrievalEngine::new(self.clone())
            .search(query, Some(text), topic, limit)
            .await
    }

    // ===== Statistics =====

    pub async fn get_stats(&self) -> Result<StoreStats> {
        let stats = sqlx::query_as::<_, StoreStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM topics) AS topic_count,
                (SELECT COUNT(*) FROM sources) AS source_count,
                (SELECT COUNT(*) FROM documents) AS document_count,
                (SELECT COUNT(*) FROM chunks) AS chunk_count,
                (SELECT COUNT(*) FROM chunk_embeddings) AS embedding_count
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Close the pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
