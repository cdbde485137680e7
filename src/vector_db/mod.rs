// The memory store is the default backend (no external service)
pub mod memory_store;
pub use memory_store::{MemoryStore, cosine_similarity};

// Qdrant requires an external server, reached over its REST API
pub mod qdrant_client;
pub use qdrant_client::QdrantStore;

use crate::config::VectorDbConfig;
use crate::error::VectorDbError;
use crate::types::{EmbeddedChunk, SearchResult};
use anyhow::Result;
use std::sync::Arc;

/// Trait for vector store operations
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert embedded chunks keyed by chunk id, returning how many were written
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<usize>;

    /// Nearest neighbours of `query`, best first, at most `limit`
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Remove chunks by id, returning how many were removed
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Remove everything
    async fn clear(&self) -> Result<()>;

    /// Number of stored vectors
    async fn count(&self) -> Result<usize>;

    /// Flush and release resources
    async fn close(&self) -> Result<()>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Open the store named by `config.backend`
///
/// `dimension` is only used when the remote collection has to be created.
pub async fn store_from_config(
    config: &VectorDbConfig,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryStore::open(config.storage_path.clone())?),
        "qdrant" => Arc::new(
            QdrantStore::connect(&config.qdrant_url, &config.collection, dimension)
                .await?
                .with_batch_size(config.upsert_batch_size),
        ),
        other => return Err(VectorDbError::UnknownBackend(other.to_string()).into()),
    };

    tracing::info!("Using {} vector store", store.backend_name());
    Ok(store)
}
