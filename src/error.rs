/// Centralized error types for code-retriever using thiserror
///
/// Per-file and per-chunk failures are absorbed by the components that hit them;
/// the types here describe what can reach a caller.
use crate::embedding::EmbedReport;
use thiserror::Error;

/// Main error type for the retrieval system
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Embedding pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while walking a source tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Failed to read file '{file}': {reason}")]
    FileReadFailed { file: String, reason: String },

    #[error("No source files found in {0}")]
    NoFilesFound(String),
}

/// Errors related to a single embedding request
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Failed to send embedding request to {endpoint}: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("Embedding service returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Failed to decode embedding response: {0}")]
    DecodeFailed(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding service is unhealthy: {0}")]
    Unhealthy(String),

    #[error("Unknown embedding provider: {0}")]
    UnknownProvider(String),

    #[error("Embedding was cancelled")]
    Cancelled,
}

/// Aggregate outcome of a pipeline run that did not succeed
///
/// Both variants keep whatever was embedded before the run stopped.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(
        "too many failures: only {}/{} chunks embedded ({} failed)",
        .0.embedded.len(),
        .0.total,
        .0.failed
    )]
    TooManyFailures(EmbedReport),

    #[error(
        "embedding cancelled after {}/{} chunks",
        .0.embedded.len(),
        .0.total
    )]
    Cancelled(EmbedReport),
}

impl PipelineError {
    /// Partial results gathered before the run stopped
    pub fn report(&self) -> &EmbedReport {
        match self {
            PipelineError::TooManyFailures(report) | PipelineError::Cancelled(report) => report,
        }
    }

    pub fn into_report(self) -> EmbedReport {
        match self {
            PipelineError::TooManyFailures(report) | PipelineError::Cancelled(report) => report,
        }
    }
}

/// Errors related to vector store operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to connect to vector database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Failed to store embeddings: {0}")]
    StoreFailed(String),

    #[error("Failed to search embeddings: {0}")]
    SearchFailed(String),

    #[error("Failed to delete embeddings: {0}")]
    DeleteFailed(String),

    #[error("Failed to clear database: {0}")]
    ClearFailed(String),

    #[error("Failed to count points: {0}")]
    CountFailed(String),

    #[error("Failed to load store from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to persist store to '{path}': {reason}")]
    PersistFailed { path: String, reason: String },

    #[error("Unknown vector database backend: {0}")]
    UnknownBackend(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl EmbeddingError {
    /// Transport failures and server-side statuses may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::RequestFailed { .. } => true,
            EmbeddingError::BadStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl RetrievalError {
    /// Check if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            RetrievalError::Embedding(err) => err.is_retryable(),
            RetrievalError::VectorDb(VectorDbError::ConnectionFailed(_)) => true,
            RetrievalError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetrievalError::Scan(ScanError::DirectoryNotFound("/test".to_string()));
        assert_eq!(err.to_string(), "Scan error: Directory not found: /test");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RetrievalError = io_err.into();
        assert!(matches!(err, RetrievalError::Io(_)));
    }

    #[test]
    fn test_is_retryable() {
        let retryable =
            RetrievalError::VectorDb(VectorDbError::ConnectionFailed("refused".to_string()));
        assert!(retryable.is_retryable());

        let server_error = RetrievalError::Embedding(EmbeddingError::BadStatus {
            status: 503,
            body: "busy".to_string(),
        });
        assert!(server_error.is_retryable());

        let client_error = RetrievalError::Embedding(EmbeddingError::BadStatus {
            status: 400,
            body: "bad input".to_string(),
        });
        assert!(!client_error.is_retryable());

        let throttled = EmbeddingError::BadStatus {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(throttled.is_retryable());
        assert!(!EmbeddingError::DecodeFailed("eof".to_string()).is_retryable());
        assert!(!EmbeddingError::Cancelled.is_retryable());
    }

    #[test]
    fn test_embedding_error_dimension_mismatch() {
        let err = EmbeddingError::DimensionMismatch {
            expected: 768,
            actual: 384,
        };
        assert_eq!(
            err.to_string(),
            "Invalid embedding dimension: expected 768, got 384"
        );
    }

    #[test]
    fn test_vector_db_error_collection_creation() {
        let err = VectorDbError::CollectionCreationFailed {
            collection: "code_chunks".to_string(),
            reason: "already exists".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create collection 'code_chunks': already exists"
        );
    }

    #[test]
    fn test_pipeline_error_reports_counts() {
        let report = EmbedReport {
            embedded: Vec::new(),
            failed: 4,
            total: 4,
        };
        let err = PipelineError::TooManyFailures(report);
        assert_eq!(
            err.to_string(),
            "too many failures: only 0/4 chunks embedded (4 failed)"
        );
        assert_eq!(err.report().failed, 4);
        assert_eq!(err.into_report().total, 4);
    }

    #[test]
    fn test_error_chain() {
        let err: RetrievalError = EmbeddingError::Cancelled.into();
        assert!(matches!(err, RetrievalError::Embedding(_)));
        assert_eq!(err.to_string(), "Embedding error: Embedding was cancelled");
    }
}
