//! Ingest command implementation

use crate::chunk::{ChunkRecord, Chunker};
use crate::config::Config;
use crate::embed::{embed_in_batches, Embedder};
use crate::error::Result;
use crate::fetch::{list_files, GitFetcher, SourceFetcher};
use crate::pack::{LanguagePack, SourceDef};
use crate::parse::{parse_content, ParsedDocument};
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use crate::store::{ChunkId, NewChunk, Source, SourceId, SourceKind, Store, Topic};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Statistics from an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub topic: String,
    pub sources_processed: usize,
    pub sources_skipped: usize,
    pub docs_processed: usize,
    pub docs_skipped: usize,
    pub chunks_created: usize,
    pub embeddings_stored: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Only ingest the source with this name
    pub source: Option<String>,
    /// Replace documents that are already indexed
    pub force: bool,
}

/// Result of ingesting one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub document_id: i64,
    pub chunks_created: usize,
    pub embeddings_stored: usize,
    pub errors: Vec<String>,
}

/// Chunk, persist and embed single documents
pub struct DocumentIngestor<'a> {
    store: &'a Store,
    embedder: &'a dyn Embedder,
    chunker: Chunker,
    batch_size: usize,
    min_chars: usize,
}

impl<'a> DocumentIngestor<'a> {
    pub fn new(config: &Config, store: &'a Store, embedder: &'a dyn Embedder) -> Self {
        Self {
            store,
            embedder,
            chunker: Chunker::from_config(&config.chunk),
            batch_size: config.embedding.batch_size,
            min_chars: config.embedding.min_chars,
        }
    }

    /// Ingest `doc` as `path` under a source
    ///
    /// Returns `None` when the path is already indexed and `force` is off.
    /// Chunk and embedding failures are collected in the outcome; only
    /// failures to create the document itself are returned as errors.
    pub async fn ingest(
        &self,
        source_id: SourceId,
        path: &str,
        doc: &ParsedDocument,
        force: bool,
    ) -> Result<Option<DocumentOutcome>> {
        let document = match self.store.create_document(source_id, path, &doc.title).await {
            Ok(document) => document,
            Err(e) if e.is_conflict() => {
                if !force {
                    debug!("{} already indexed, skipping", path);
                    return Ok(None);
                }
                let existing = self.store.get_document_by_path(source_id, path).await?;
                self.store.delete_document(existing.id).await?;
                self.store.create_document(source_id, path, &doc.title).await?
            }
            Err(e) => return Err(e),
        };

        let records = self.chunker.chunk(doc);
        let mut outcome = DocumentOutcome {
            document_id: document.id,
            ..Default::default()
        };

        // position in `records` -> stored id
        let mut stored: Vec<Option<ChunkId>> = Vec::with_capacity(records.len());
        let mut pending: Vec<(ChunkId, String)> = Vec::new();

        for (position, record) in records.iter().enumerate() {
            let parent = match record.parent_index {
                None => None,
                Some(idx) => match stored.get(idx).copied().flatten() {
                    Some(id) => Some(id),
                    None => {
                        outcome.errors.push(format!(
                            "{}: chunk {} skipped because its parent was not stored",
                            path, position
                        ));
                        stored.push(None);
                        continue;
                    }
                },
            };

            match self.store.create_chunk(&new_chunk(document.id, parent, record)).await {
                Ok(chunk) => {
                    stored.push(Some(chunk.id));
                    outcome.chunks_created += 1;
                    if record.content.trim().chars().count() >= self.min_chars {
                        pending.push((chunk.id, record.content.clone()));
                    }
                }
                Err(e) => {
                    warn!("Failed to store chunk {} of {}: {}", position, path, e);
                    outcome
                        .errors
                        .push(format!("{}: chunk {}: {}", path, position, e));
                    stored.push(None);
                }
            }
        }

        self.embed_chunks(path, pending, &mut outcome).await;
        Ok(Some(outcome))
    }

    async fn embed_chunks(
        &self,
        path: &str,
        pending: Vec<(ChunkId, String)>,
        outcome: &mut DocumentOutcome,
    ) {
        for batch in pending.chunks(self.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let embeddings = match embed_in_batches(self.embedder, texts, self.batch_size).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    warn!("Failed to embed {} chunks of {}: {}", batch.len(), path, e);
                    outcome
                        .errors
                        .push(format!("{}: embedding {} chunks: {}", path, batch.len(), e));
                    continue;
                }
            };

            for ((chunk_id, _), embedding) in batch.iter().zip(embeddings) {
                match self.store.store_embedding(*chunk_id, &embedding).await {
                    Ok(()) => outcome.embeddings_stored += 1,
                    Err(e) => {
                        warn!("Failed to store embedding for chunk {}: {}", chunk_id, e);
                        outcome
                            .errors
                            .push(format!("{}: embedding for chunk {}: {}", path, chunk_id, e));
                    }
                }
            }
        }
    }
}

fn new_chunk(document_id: i64, parent: Option<ChunkId>, record: &ChunkRecord) -> NewChunk<'_> {
    NewChunk {
        document_id,
        parent_chunk_id: parent,
        level: record.level,
        title: &record.title,
        content: &record.content,
        breadcrumbs: &record.breadcrumbs,
    }
}

/// Ingest every source of a language pack manifest
pub async fn cmd_ingest_pack(
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
    manifest: &Path,
    options: IngestOptions,
) -> Result<IngestStats> {
    let pack = LanguagePack::load(manifest)?;
    let fetcher = GitFetcher::new(config.cache_dir(), config.fetch.git_depth);
    ingest_pack(config, store, embedder, &fetcher, &pack, &options).await
}

/// Ingest a loaded pack using `fetcher` to materialize sources
pub async fn ingest_pack(
    config: &Config,
    store: &Store,
    embedder: &dyn Embedder,
    fetcher: &dyn SourceFetcher,
    pack: &LanguagePack,
    options: &IngestOptions,
) -> Result<IngestStats> {
    info!("Ingesting language pack: {}", pack.language);

    let mut stats = IngestStats {
        topic: pack.language.clone(),
        ..Default::default()
    };

    let topic = get_or_create_topic(store, &pack.language, &pack.display_name).await?;
    let ingestor = DocumentIngestor::new(config, store, embedder);

    for def in pack.select_sources(options.source.as_deref())? {
        if def.kind == SourceKind::Web {
            warn!("Skipping web source '{}': web fetching is not supported", def.name);
            stats.sources_skipped += 1;
            continue;
        }

        if let Err(e) =
            ingest_source(store, &ingestor, fetcher, &topic, def, options, &mut stats).await
        {
            warn!("Failed to ingest source '{}': {}", def.name, e);
            stats.errors.push(format!("{}: {}", def.name, e));
        }
    }

    info!(
        "Ingestion complete: {} docs processed, {} skipped, {} chunks, {} embeddings",
        stats.docs_processed, stats.docs_skipped, stats.chunks_created, stats.embeddings_stored
    );

    Ok(stats)
}

async fn ingest_source(
    store: &Store,
    ingestor: &DocumentIngestor<'_>,
    fetcher: &dyn SourceFetcher,
    topic: &Topic,
    def: &SourceDef,
    options: &IngestOptions,
    stats: &mut IngestStats,
) -> Result<()> {
    let source = get_or_create_source(store, topic, def).await?;
    let root = fetcher.fetch(&def.url).await?;
    let files = list_files(&root, &def.paths, &def.patterns)?;
    info!("Source '{}': {} files", def.name, files.len());

    let pb = start_progress_bar(files.len(), &def.name);

    for rel in &files {
        let rel_path = rel.to_string_lossy().replace('\\', "/");
        advance_progress(&pb, &rel_path);

        let doc = match read_document(&root.join(rel)) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to read {}: {}", rel_path, e);
                stats.errors.push(format!("{}: {}", rel_path, e));
                continue;
            }
        };

        match ingestor.ingest(source.id, &rel_path, &doc, options.force).await {
            Ok(Some(outcome)) => {
                stats.docs_processed += 1;
                stats.chunks_created += outcome.chunks_created;
                stats.embeddings_stored += outcome.embeddings_stored;
                stats.errors.extend(outcome.errors);
            }
            Ok(None) => stats.docs_skipped += 1,
            Err(e) => {
                warn!("Failed to ingest {}: {}", rel_path, e);
                stats.errors.push(format!("{}: {}", rel_path, e));
            }
        }
    }

    finish_progress(pb, &format!("{} done", def.name));
    stats.sources_processed += 1;
    Ok(())
}

fn read_document(path: &Path) -> Result<ParsedDocument> {
    let content = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(parse_content(&content, path)?.with_fallback_title(&stem))
}

async fn get_or_create_topic(store: &Store, name: &str, display_name: &str) -> Result<Topic> {
    match store.create_topic(name, display_name).await {
        Ok(topic) => Ok(topic),
        Err(e) if e.is_conflict() => store.get_topic_by_name(name).await,
        Err(e) => Err(e),
    }
}

async fn get_or_create_source(store: &Store, topic: &Topic, def: &SourceDef) -> Result<Source> {
    match store
        .create_source(topic.id, &def.name, def.kind, &def.url)
        .await
    {
        Ok(source) => Ok(source),
        Err(e) if e.is_conflict() => store.get_source_by_name(topic.id, &def.name).await,
        Err(e) => Err(e),
    }
}

/// Print ingestion stats to console
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n📥 Ingested '{}'\n", stats.topic);
    println!(
        "Sources: {} processed, {} skipped",
        stats.sources_processed, stats.sources_skipped
    );
    println!(
        "Documents: {} processed, {} already indexed",
        stats.docs_processed, stats.docs_skipped
    );
    println!("Chunks created: {}", stats.chunks_created);
    println!("Embeddings stored: {}", stats.embeddings_stored);

    if !stats.errors.is_empty() {
        println!("\n⚠ {} errors:", stats.errors.len());
        for err in &stats.errors {
            println!("  - {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkLevel;
    use crate::embed::tests::FakeEmbedder;
    use crate::store::tests::{setup_store, DIM};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct LocalFetcher(PathBuf);

    #[async_trait]
    impl SourceFetcher for LocalFetcher {
        async fn fetch(&self, _url: &str) -> Result<PathBuf> {
            Ok(self.0.clone())
        }
    }

    const DOC: &str = "# Effective Go\n\nIntro to writing clear Go.\n\n## Names\n\nUse MixedCaps for names.\n\n## Errors\n\nErrors are values.\n";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.store.dimension = DIM;
        config
    }

    async fn source_id(store: &Store) -> SourceId {
        let topic = store.create_topic("go", "Go").await.unwrap();
        store
            .create_source(topic.id, "docs", SourceKind::Repository, "u")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_ingest_document_persists_hierarchy() {
        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);
        let ingestor = DocumentIngestor::new(&config, &store, &embedder);
        let source = source_id(&store).await;

        let doc = crate::parse::parse_markdown(DOC).unwrap();
        let outcome = ingestor
            .ingest(source, "effective.md", &doc, false)
            .await
            .unwrap()
            .unwrap();

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let chunks = store.list_document_chunks(outcome.document_id).await.unwrap();
        assert_eq!(chunks.len(), outcome.chunks_created);
        assert_eq!(chunks[0].level, ChunkLevel::Summary);
        assert!(chunks[1..]
            .iter()
            .all(|c| c.parent_chunk_id == Some(chunks[0].id)));

        // "Errors are values." is long enough; every chunk here is
        assert_eq!(outcome.embeddings_stored, chunks.len());

        let hits = store.search_lexical("MixedCaps", None, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.breadcrumbs(), vec!["Effective Go", "Names"]);
    }

    #[tokio::test]
    async fn test_reingest_skips_unless_forced() {
        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);
        let ingestor = DocumentIngestor::new(&config, &store, &embedder);
        let source = source_id(&store).await;
        let doc = crate::parse::parse_markdown(DOC).unwrap();

        let first = ingestor.ingest(source, "a.md", &doc, false).await.unwrap().unwrap();
        assert!(ingestor.ingest(source, "a.md", &doc, false).await.unwrap().is_none());
        let before = store.get_stats().await.unwrap();

        let forced = ingestor.ingest(source, "a.md", &doc, true).await.unwrap().unwrap();
        let after = store.get_stats().await.unwrap();

        assert_ne!(first.document_id, forced.document_id);
        assert_eq!(before.chunk_count, after.chunk_count);
        assert_eq!(before.embedding_count, after.embedding_count);
        assert_eq!(after.document_count, 1);
    }

    #[tokio::test]
    async fn test_short_chunks_are_not_embedded() {
        let (store, _tmp) = setup_store().await;
        let mut config = test_config();
        config.embedding.min_chars = 100;
        let embedder = FakeEmbedder::new(DIM);
        let ingestor = DocumentIngestor::new(&config, &store, &embedder);
        let source = source_id(&store).await;

        let doc = crate::parse::parse_markdown("# Tiny\n\nshort\n").unwrap();
        let outcome = ingestor.ingest(source, "t.md", &doc, false).await.unwrap().unwrap();

        assert!(outcome.chunks_created > 0);
        assert_eq!(outcome.embeddings_stored, 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_recorded_not_fatal() {
        struct WrongDimension;

        #[async_trait]
        impl Embedder for WrongDimension {
            async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0]).collect())
            }
            fn dimension(&self) -> usize {
                1
            }
            fn model_name(&self) -> &str {
                "wrong"
            }
        }

        let (store, _tmp) = setup_store().await;
        let config = test_config();
        let embedder = WrongDimension;
        let ingestor = DocumentIngestor::new(&config, &store, &embedder);
        let source = source_id(&store).await;
        let doc = crate::parse::parse_markdown(DOC).unwrap();

        let outcome = ingestor.ingest(source, "a.md", &doc, false).await.unwrap().unwrap();
        assert!(outcome.chunks_created > 0);
        assert_eq!(outcome.embeddings_stored, 0);
        assert_eq!(outcome.errors.len(), outcome.chunks_created);
    }

    #[tokio::test]
    async fn test_ingest_pack_end_to_end() {
        let (store, _tmp) = setup_store().await;
        let checkout = TempDir::new().unwrap();
        std::fs::create_dir_all(checkout.path().join("docs")).unwrap();
        std::fs::write(checkout.path().join("docs/effective.md"), DOC).unwrap();
        std::fs::write(checkout.path().join("docs/untitled.md"), "Just prose here.\n").unwrap();
        std::fs::write(checkout.path().join("docs/skip.txt"), "ignored").unwrap();

        let pack = LanguagePack::from_yaml(
            r#"
language: go
display_name: Go
sources:
  - name: local
    type: git
    url: https://example.com/local.git
    paths: [docs]
  - name: blog
    type: web
    url: https://go.dev/blog
"#,
        )
        .unwrap();

        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);
        let fetcher = LocalFetcher(checkout.path().to_path_buf());
        let options = IngestOptions::default();

        let stats = ingest_pack(&config, &store, &embedder, &fetcher, &pack, &options)
            .await
            .unwrap();
        assert_eq!(stats.sources_processed, 1);
        assert_eq!(stats.sources_skipped, 1);
        assert_eq!(stats.docs_processed, 2);
        assert!(stats.errors.is_empty(), "{:?}", stats.errors);

        // untitled document falls back to its file stem
        let topic = store.get_topic_by_name("go").await.unwrap();
        let source = store.get_source_by_name(topic.id, "local").await.unwrap();
        let doc = store
            .get_document_by_path(source.id, "docs/untitled.md")
            .await
            .unwrap();
        assert_eq!(doc.title, "untitled");

        // second run finds everything already present
        let again = ingest_pack(&config, &store, &embedder, &fetcher, &pack, &options)
            .await
            .unwrap();
        assert_eq!(again.docs_processed, 0);
        assert_eq!(again.docs_skipped, 2);
        assert_eq!(store.list_topics().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_source_filter() {
        let (store, _tmp) = setup_store().await;
        let pack = LanguagePack::from_yaml(
            "language: go\nsources:\n  - {name: a, type: git, url: u}\n",
        )
        .unwrap();
        let config = test_config();
        let embedder = FakeEmbedder::new(DIM);
        let fetcher = LocalFetcher(PathBuf::from("."));
        let options = IngestOptions {
            source: Some("missing".to_string()),
            force: false,
        };

        let err = ingest_pack(&config, &store, &embedder, &fetcher, &pack, &options)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
