/// Configuration system for code-retriever
///
/// Supports loading from multiple sources with priority:
/// Environment variables > Config file > Defaults
use crate::error::{ConfigError, RetrievalError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Directory walk filters
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Text chunking budgets
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding provider and pipeline policy
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store backend
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Ranking and fusion tunables
    #[serde(default)]
    pub search: SearchConfig,

    /// Repository indexing behaviour
    #[serde(default)]
    pub indexing: IndexingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Extension allow-list, compared lower-cased and without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names that are never descended into
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Files at or below this many characters become a single chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Character budget shared between neighbouring windows
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: "http" (CodeBERT-style embedding service) or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the HTTP embedding service
    #[serde(default = "default_embedding_host")]
    pub host: String,

    /// Base URL of the Ollama server
    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,

    /// Ollama embedding model
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    /// Expected embedding dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Token budget forwarded to the HTTP embedding service
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Maximum simultaneous embedding requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Attempts per chunk before it is counted as failed
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Linear backoff unit between attempts, in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Minimum embedded/total ratio for a run to count as successful
    #[serde(default = "default_min_success_ratio")]
    pub min_success_ratio: f64,

    /// Character cap on rendered embedding input
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Database backend: "memory" or "qdrant"
    #[serde(default = "default_db_backend")]
    pub backend: String,

    /// Qdrant REST endpoint
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    /// Collection name for vector storage
    #[serde(default = "default_collection_name")]
    pub collection: String,

    /// JSON file backing the memory store; `None` keeps it purely in memory
    #[serde(default = "default_storage_path")]
    pub storage_path: Option<PathBuf>,

    /// Points per upsert request against the remote store
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,

    /// Use the memory store when the remote store cannot be reached
    #[serde(default = "default_fallback_to_memory")]
    pub fallback_to_memory: bool,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Fusion weight of the vector ranking
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Fusion weight of the keyword ranking
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Candidates requested from each method, as a multiple of k
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalisation
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,

    /// Result limit used when callers do not pass one
    #[serde(default = "default_result_limit")]
    pub default_limit: usize,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Skip embedding when the store already holds vectors; only the keyword index is rebuilt
    #[serde(default = "default_reuse_existing")]
    pub reuse_existing: bool,
}

// Default value functions
fn default_extensions() -> Vec<String> {
    ["go", "py", "js", "ts", "java", "rs", "cpp", "c", "h"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignore_dirs() -> Vec<String> {
    [".git", "node_modules", "vendor", "__pycache__", ".idea", ".vscode"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_provider() -> String {
    "http".to_string()
}

fn default_embedding_host() -> String {
    "http://localhost:8001".to_string()
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_max_length() -> usize {
    512
}

fn default_concurrency() -> usize {
    2
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_min_success_ratio() -> f64 {
    0.5
}

fn default_max_input_chars() -> usize {
    8000
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_db_backend() -> String {
    "memory".to_string()
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection_name() -> String {
    "code_chunks".to_string()
}

fn default_storage_path() -> Option<PathBuf> {
    let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    Some(
        base.join("code-retriever")
            .join(format!("vectors_{}.json", default_collection_name())),
    )
}

fn default_upsert_batch_size() -> usize {
    100
}

fn default_fallback_to_memory() -> bool {
    true
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_candidate_multiplier() -> usize {
    3
}

fn default_bm25_k1() -> f64 {
    1.5
}

fn default_bm25_b() -> f64 {
    0.75
}

fn default_result_limit() -> usize {
    10
}

fn default_reuse_existing() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            host: default_embedding_host(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            dimension: default_dimension(),
            max_length: default_max_length(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            min_success_ratio: default_min_success_ratio(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: default_db_backend(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection_name(),
            storage_path: default_storage_path(),
            upsert_batch_size: default_upsert_batch_size(),
            fallback_to_memory: default_fallback_to_memory(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            candidate_multiplier: default_candidate_multiplier(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            default_limit: default_result_limit(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            reuse_existing: default_reuse_existing(),
        }
    }
}

impl ScannerConfig {
    /// Extension allow-list in the form the scanner compares against
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RetrievalError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, RetrievalError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), RetrievalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.scanner.normalized_extensions().is_empty() {
            return Err(invalid("scanner.extensions", "must list at least one extension"));
        }

        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "must be greater than 0"));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap",
                format!(
                    "must be smaller than chunk_size ({}), got {}",
                    self.chunking.chunk_size, self.chunking.chunk_overlap
                ),
            ));
        }

        if self.embedding.provider != "http" && self.embedding.provider != "ollama" {
            return Err(invalid(
                "embedding.provider",
                format!("must be 'http' or 'ollama', got '{}'", self.embedding.provider),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "must be greater than 0"));
        }

        if self.embedding.concurrency == 0 {
            return Err(invalid("embedding.concurrency", "must be greater than 0"));
        }

        if self.embedding.max_retries == 0 {
            return Err(invalid("embedding.max_retries", "must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.embedding.min_success_ratio) {
            return Err(invalid(
                "embedding.min_success_ratio",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.embedding.min_success_ratio
                ),
            ));
        }

        if self.embedding.max_input_chars == 0 {
            return Err(invalid("embedding.max_input_chars", "must be greater than 0"));
        }

        if self.vector_db.backend != "memory" && self.vector_db.backend != "qdrant" {
            return Err(invalid(
                "vector_db.backend",
                format!(
                    "must be 'memory' or 'qdrant', got '{}'",
                    self.vector_db.backend
                ),
            ));
        }

        if self.vector_db.collection.trim().is_empty() {
            return Err(invalid("vector_db.collection", "must not be empty"));
        }

        if self.vector_db.upsert_batch_size == 0 {
            return Err(invalid("vector_db.upsert_batch_size", "must be greater than 0"));
        }

        if self.search.vector_weight < 0.0 || self.search.keyword_weight < 0.0 {
            return Err(invalid("search.weights", "must be non-negative"));
        }

        if self.search.candidate_multiplier == 0 {
            return Err(invalid("search.candidate_multiplier", "must be greater than 0"));
        }

        if self.search.bm25_k1 < 0.0 || !(0.0..=1.0).contains(&self.search.bm25_b) {
            return Err(invalid(
                "search.bm25",
                "k1 must be non-negative and b between 0.0 and 1.0",
            ));
        }

        if self.search.default_limit == 0 {
            return Err(invalid("search.default_limit", "must be greater than 0"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("CODE_RETRIEVER_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(host) = std::env::var("CODE_RETRIEVER_EMBEDDING_HOST") {
            self.embedding.host = host;
        }

        if let Ok(host) = std::env::var("CODE_RETRIEVER_OLLAMA_HOST") {
            self.embedding.ollama_host = host;
        }

        if let Ok(model) = std::env::var("CODE_RETRIEVER_OLLAMA_MODEL") {
            self.embedding.ollama_model = model;
        }

        if let Ok(concurrency) = std::env::var("CODE_RETRIEVER_CONCURRENCY")
            && let Ok(value) = concurrency.parse()
        {
            self.embedding.concurrency = value;
        }

        if let Ok(retries) = std::env::var("CODE_RETRIEVER_MAX_RETRIES")
            && let Ok(value) = retries.parse()
        {
            self.embedding.max_retries = value;
        }

        if let Ok(backend) = std::env::var("CODE_RETRIEVER_DB_BACKEND") {
            self.vector_db.backend = backend;
        }

        if let Ok(url) = std::env::var("CODE_RETRIEVER_QDRANT_URL") {
            self.vector_db.qdrant_url = url;
        }

        if let Ok(collection) = std::env::var("CODE_RETRIEVER_COLLECTION") {
            self.vector_db.collection = collection;
        }

        if let Ok(path) = std::env::var("CODE_RETRIEVER_STORAGE_PATH") {
            self.vector_db.storage_path = Some(PathBuf::from(path));
        }

        if let Ok(weight) = std::env::var("CODE_RETRIEVER_VECTOR_WEIGHT")
            && let Ok(value) = weight.parse()
        {
            self.search.vector_weight = value;
        }

        if let Ok(weight) = std::env::var("CODE_RETRIEVER_KEYWORD_WEIGHT")
            && let Ok(value) = weight.parse()
        {
            self.search.keyword_weight = value;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RetrievalError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
