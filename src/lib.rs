//! # code-retriever - Hybrid Code Search
//!
//! Indexes a source tree into addressable chunks and answers queries by
//! fusing vector similarity with BM25 keyword ranking.
//!
//! ## Overview
//!
//! Files are walked and split into chunks (Go is parsed with tree-sitter,
//! everything else is cut into overlapping line windows). Chunks feed a
//! keyword index directly and an embedding pipeline that calls an HTTP
//! embedding service with bounded concurrency and retries. Vectors land in
//! a vector store, and searches merge both rankings with weighted
//! Reciprocal Rank Fusion.
//!
//! ## Key Features
//!
//! - **Structured Chunking**: functions, methods, types, const/var groups and imports for Go
//! - **Sliding Windows**: line-based windows with overlap for every other language
//! - **Embedding Pipeline**: bounded fan-out, linear-backoff retries, success-ratio threshold, cancellation
//! - **Two Stores**: brute-force in-memory store with JSON persistence, or Qdrant over REST
//! - **Hybrid Search**: BM25 plus vector similarity, fused with RRF (C = 60)
//!
//! ## Architecture
//!
//! ```text
//!  FileWalker -> CodeChunker -> chunks --+--> BM25Search ----------------+
//!                                        |                               |
//!                                        +--> EmbeddingPipeline          +--> RRF -> results
//!                                               |                        |
//!                                               +--> VectorStore --------+
//! ```
//!
//! ## Modules
//!
//! - [`indexer`]: file walking, language detection, AST and window chunking
//! - [`embedding`]: embedding providers and the embedding pipeline
//! - [`vector_db`]: vector store abstraction (memory and Qdrant)
//! - [`bm25_search`]: tokenizer and BM25 index
//! - [`retriever`]: hybrid retriever and rank fusion
//! - [`client`]: high-level client built from [`Config`]
//! - [`config`]: configuration with TOML and environment overrides
//! - [`types`]: chunk and result types
//! - [`error`]: error types
//!
//! ## Usage Example
//!
//! ```no_run
//! use code_retriever::{Config, RetrieverClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RetrieverClient::with_config(Config::new()?).await?;
//!     let cancel = CancellationToken::new();
//!
//!     let report = client.index_directory(".", None, &cancel).await?;
//!     println!("{} chunks indexed", report.index.chunks);
//!
//!     for hit in client.search("retry with backoff", 5, &cancel).await? {
//!         println!("{:.4} {}:{}", hit.score, hit.chunk.file_path, hit.chunk.start_line);
//!     }
//!     Ok(())
//! }
//! ```

/// BM25 keyword index over chunk text
pub mod bm25_search;

/// High-level client wiring indexer, embeddings, stores and retrieval
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding providers and the bounded-concurrency embedding pipeline
pub mod embedding;

/// Error types and utilities
pub mod error;

/// File walking, code chunking, and AST parsing
pub mod indexer;

/// Hybrid retriever and Reciprocal Rank Fusion
pub mod retriever;

/// Chunk, search result and index metadata types
pub mod types;

/// Vector store abstraction with memory and Qdrant backends
pub mod vector_db;

pub use client::{DirectoryIndexReport, HealthStatus, RetrieverClient};
pub use config::Config;
pub use embedding::{EmbedReport, EmbeddingPipeline, EmbeddingProvider, PipelineSettings};
pub use error::{PipelineError, RetrievalError};
pub use retriever::{FusionWeights, HybridRetriever};
pub use types::{Chunk, ChunkKind, EmbeddedChunk, IndexReport, SearchResult};
pub use vector_db::{MemoryStore, QdrantStore, VectorStore};
