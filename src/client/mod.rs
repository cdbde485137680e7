//! Library client for code-retriever
//!
//! [`RetrieverClient`] wires the indexer, the embedding provider, the vector
//! store and the hybrid retriever together from a [`Config`].

use crate::config::{Config, VectorDbConfig};
use crate::embedding::{
    EmbeddingPipeline, EmbeddingProvider, PipelineSettings, ProgressCallback, ProviderHealth,
    provider_from_config,
};
use crate::indexer::Indexer;
use crate::retriever::HybridRetriever;
use crate::types::{Chunk, IndexReport, IndexStats, RepositoryInfo, SearchResult};
use crate::vector_db::{MemoryStore, VectorStore, store_from_config};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Outcome of [`RetrieverClient::index_directory`]
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryIndexReport {
    pub repository: RepositoryInfo,
    pub stats: IndexStats,
    pub index: IndexReport,
    /// Files that could not be read, formatted
    pub errors: Vec<String>,
    /// Vectors already in the store were kept; only the keyword index was rebuilt
    pub reused_existing: bool,
    pub duration_ms: u64,
}

/// Combined health of the embedding backend and the vector store
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: ProviderHealth,
    pub dimension: usize,
    pub store_backend: &'static str,
    pub stored_vectors: usize,
    pub keyword_index: bool,
}

/// Main client for indexing and searching a code tree
///
/// # Example
///
/// ```no_run
/// use code_retriever::{Config, RetrieverClient};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RetrieverClient::with_config(Config::default()).await?;
///     let cancel = CancellationToken::new();
///
///     client.index_directory("/path/to/repo", None, &cancel).await?;
///     for hit in client.search("parse config file", 5, &cancel).await? {
///         println!("{}:{} {}", hit.chunk.file_path, hit.chunk.start_line, hit.chunk.name);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RetrieverClient {
    pub(crate) retriever: Arc<HybridRetriever>,
    pub(crate) indexer: Arc<Indexer>,
    pub(crate) config: Arc<Config>,
    // One indexing run at a time
    pub(crate) indexing_lock: Arc<Mutex<()>>,
}

impl RetrieverClient {
    /// Client from defaults, `CODE_RETRIEVER_*` overrides applied
    pub async fn new() -> Result<Self> {
        let config = Config::new().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    /// Client using the provider and store named in `config`
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let provider =
            provider_from_config(&config.embedding).context("Failed to create embedding provider")?;
        Self::with_provider(config, provider).await
    }

    /// Client with a caller-supplied embedding provider
    pub async fn with_provider(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        tracing::info!("Initializing retriever client");
        tracing::debug!("Vector store backend: {}", config.vector_db.backend);
        tracing::debug!("Embedding model: {}", provider.model_name());
        tracing::debug!("Chunk size: {}", config.chunking.chunk_size);

        let store = open_store(&config.vector_db, provider.dimension()).await?;
        let pipeline =
            EmbeddingPipeline::new(provider, PipelineSettings::from_config(&config.embedding));
        let retriever =
            HybridRetriever::new(store, pipeline).with_search_config(&config.search);
        let indexer = Indexer::new(config.scanner.clone(), &config.chunking);

        Ok(Self {
            retriever: Arc::new(retriever),
            indexer: Arc::new(indexer),
            config: Arc::new(config),
            indexing_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Scan, chunk and index a directory
    ///
    /// With `indexing.reuse_existing` set and vectors already stored, nothing
    /// is embedded; the keyword index is rebuilt from the fresh chunks.
    pub async fn index_directory(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<DirectoryIndexReport> {
        let _running = self.indexing_lock.lock().await;
        let started = Instant::now();

        let indexer = Arc::clone(&self.indexer);
        let root = path.as_ref().to_path_buf();
        let scanned = tokio::task::spawn_blocking(move || indexer.index_repository(root))
            .await
            .context("Indexing task failed")??;

        tracing::info!(
            "Chunked {} files into {} chunks in {:?}",
            scanned.repository.total_files,
            scanned.chunks.len(),
            scanned.elapsed
        );

        let existing = self.retriever.count().await?;
        let reused_existing = self.config.indexing.reuse_existing && existing > 0;
        let index = if reused_existing {
            tracing::info!(
                "Store already holds {} vectors, rebuilding keyword index only",
                existing
            );
            self.retriever.build_keyword_index(&scanned.chunks).await;
            IndexReport {
                chunks: scanned.chunks.len(),
                embedded: 0,
                failed: 0,
            }
        } else {
            self.retriever
                .index_chunks(&scanned.chunks, progress, cancel)
                .await?
        };

        Ok(DirectoryIndexReport {
            stats: scanned.stats(),
            repository: scanned.repository,
            index,
            errors: scanned.errors,
            reused_existing,
            duration_ms: duration_ms(started.elapsed()),
        })
    }

    /// Index an already chunked set
    pub async fn index_chunks(
        &self,
        chunks: &[Chunk],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        let _running = self.indexing_lock.lock().await;
        self.retriever.index_chunks(chunks, progress, cancel).await
    }

    /// Hybrid search; a `limit` of 0 uses `search.default_limit`
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let limit = if limit == 0 {
            self.config.search.default_limit
        } else {
            limit
        };
        self.retriever.search(query, limit, cancel).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.retriever.count().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.retriever.clear().await
    }

    pub async fn close(&self) -> Result<()> {
        self.retriever.close().await
    }

    /// Probe the embedding backend and report store state
    pub async fn health_check(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        let pipeline = self.retriever.pipeline();
        let provider = pipeline
            .provider()
            .health()
            .await
            .context("Embedding provider health check failed")?;
        let dimension = pipeline.probe_dimension(cancel).await?;

        Ok(HealthStatus {
            provider,
            dimension,
            store_backend: self.retriever.store().backend_name(),
            stored_vectors: self.retriever.count().await?,
            keyword_index: self.retriever.has_keyword_index().await,
        })
    }
}

/// Open the configured store, falling back to the memory store when the
/// remote one is unreachable and fallback is enabled
async fn open_store(config: &VectorDbConfig, dimension: usize) -> Result<Arc<dyn VectorStore>> {
    match store_from_config(config, dimension).await {
        Ok(store) => Ok(store),
        Err(e) if config.backend == "qdrant" && config.fallback_to_memory => {
            tracing::warn!(
                "Qdrant at {} unavailable ({:#}), falling back to the memory store",
                config.qdrant_url,
                e
            );
            let store = MemoryStore::open(config.storage_path.clone())
                .context("Failed to open fallback memory store")?;
            Ok(Arc::new(store))
        }
        Err(e) => Err(e).context("Failed to open vector store"),
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    elapsed.as_millis().try_into().unwrap_or(u64::MAX)
}
