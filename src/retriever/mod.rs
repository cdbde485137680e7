//! Hybrid retrieval over a vector store and a BM25 keyword index

pub mod fusion;

pub use fusion::{FusionWeights, RRF_K_CONSTANT, reciprocal_rank_fusion};

use crate::bm25_search::{BM25Search, Bm25Params};
use crate::config::SearchConfig;
use crate::embedding::{EmbeddingPipeline, ProgressCallback};
use crate::error::EmbeddingError;
use crate::types::{Chunk, IndexReport, SearchResult};
use crate::vector_db::VectorStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

/// Combines vector similarity and keyword ranking with weighted RRF
///
/// Indexing builds the keyword index first and then embeds; the keyword
/// index stays usable when embedding fails.
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    pipeline: EmbeddingPipeline,
    keyword_index: RwLock<Option<BM25Search>>,
    weights: RwLock<FusionWeights>,
    bm25_params: Bm25Params,
    candidate_multiplier: usize,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn VectorStore>, pipeline: EmbeddingPipeline) -> Self {
        Self {
            store,
            pipeline,
            keyword_index: RwLock::new(None),
            weights: RwLock::new(FusionWeights::default()),
            bm25_params: Bm25Params::default(),
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
        }
    }

    /// Apply weights, BM25 constants and candidate multiplier from config
    pub fn with_search_config(mut self, config: &SearchConfig) -> Self {
        self.weights = RwLock::new(FusionWeights {
            vector: config.vector_weight,
            keyword: config.keyword_weight,
        });
        self.bm25_params = Bm25Params {
            k1: config.bm25_k1,
            b: config.bm25_b,
        };
        self.candidate_multiplier = config.candidate_multiplier.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &EmbeddingPipeline {
        &self.pipeline
    }

    /// Index a chunk set: keyword index, then embeddings into the store
    ///
    /// When the pipeline gives up, the vectors it did produce are still
    /// stored before the [`crate::error::PipelineError`] is returned.
    pub async fn index_chunks(
        &self,
        chunks: &[Chunk],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<IndexReport> {
        self.build_keyword_index(chunks).await;

        match self.pipeline.embed(chunks, progress, cancel).await {
            Ok(report) => {
                let failed = report.failed;
                let embedded = self
                    .store
                    .insert(report.embedded)
                    .await
                    .context("Failed to store embeddings")?;

                tracing::info!(
                    "Indexed {} chunks ({} embedded, {} failed)",
                    chunks.len(),
                    embedded,
                    failed
                );
                Ok(IndexReport {
                    chunks: chunks.len(),
                    embedded,
                    failed,
                })
            }
            Err(err) => {
                let partial = err.report();
                if !partial.embedded.is_empty() {
                    self.store
                        .insert(partial.embedded.clone())
                        .await
                        .context("Failed to store partial embeddings")?;
                }
                tracing::warn!("Embedding stage failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Replace the keyword index with one built from `chunks`
    pub async fn build_keyword_index(&self, chunks: &[Chunk]) {
        let index = BM25Search::build(chunks, self.bm25_params);
        tracing::info!("Keyword index built over {} chunks", index.len());
        *self.keyword_index.write().await = Some(index);
    }

    pub async fn has_keyword_index(&self) -> bool {
        self.keyword_index.read().await.is_some()
    }

    /// Hybrid search, best first, at most `limit` results
    ///
    /// If the query cannot be embedded the keyword ranking alone is returned.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let candidates = limit.saturating_mul(self.candidate_multiplier);

        let query_vector = match self.pipeline.embed_query(query, cancel).await {
            Ok(vector) => vector,
            Err(_) if cancel.is_cancelled() => return Err(EmbeddingError::Cancelled.into()),
            Err(e) => {
                tracing::warn!("Query embedding failed, using keyword results only: {:#}", e);
                return Ok(self.keyword_search(query, limit).await);
            }
        };

        let vector_results = self
            .store
            .search(&query_vector, candidates)
            .await
            .context("Vector search failed")?;
        let keyword_results = self.keyword_search(query, candidates).await;

        let weights = *self.weights.read().await;
        tracing::debug!(
            "Fusing {} vector and {} keyword candidates",
            vector_results.len(),
            keyword_results.len()
        );
        Ok(reciprocal_rank_fusion(
            &vector_results,
            &keyword_results,
            weights,
            limit,
        ))
    }

    /// Vector similarity only; query embedding failures are returned
    pub async fn vector_search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self
            .pipeline
            .embed_query(query, cancel)
            .await
            .context("Failed to embed query")?;
        self.store.search(&query_vector, limit).await
    }

    /// BM25 only; empty when no keyword index has been built
    pub async fn keyword_search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        match self.keyword_index.read().await.as_ref() {
            Some(index) => index.search(query, limit),
            None => Vec::new(),
        }
    }

    /// Change fusion weights; takes effect on the next search
    pub async fn set_weights(&self, vector: f32, keyword: f32) {
        *self.weights.write().await = FusionWeights { vector, keyword };
    }

    pub async fn weights(&self) -> FusionWeights {
        *self.weights.read().await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Empty the vector store and drop the keyword index
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        *self.keyword_index.write().await = None;
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests;
