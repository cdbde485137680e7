use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Structural role of a chunk within its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Method,
    Struct,
    Interface,
    Constant,
    Variable,
    /// Contiguous import block
    Import,
    /// Package/module marker
    Package,
    /// Whole-file chunk (small files and parse fallbacks)
    File,
    /// Sliding-window excerpt
    #[default]
    Generic,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Struct => "struct",
            ChunkKind::Interface => "interface",
            ChunkKind::Constant => "constant",
            ChunkKind::Variable => "variable",
            ChunkKind::Import => "import",
            ChunkKind::Package => "package",
            ChunkKind::File => "file",
            ChunkKind::Generic => "generic",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantically bounded excerpt of a source file
///
/// Chunks are immutable once built; the `id` is derived from
/// `(file_path, kind, name, start_line)` so re-chunking an unchanged file
/// yields the same ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    /// Path relative to the indexed root
    pub file_path: String,
    pub language: String,
    #[serde(rename = "chunk_type")]
    pub kind: ChunkKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub signature: String,
    /// 1-indexed, inclusive
    pub start_line: usize,
    /// 1-indexed, inclusive
    pub end_line: usize,
    #[serde(default)]
    pub doc_comment: String,
    /// Receiver type for methods
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub imports: Vec<String>,
}

impl Chunk {
    pub fn new(
        kind: ChunkKind,
        file_path: impl Into<String>,
        language: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let mut chunk = Self {
            id: String::new(),
            content: content.into(),
            file_path: file_path.into(),
            language: language.into(),
            kind,
            name: name.into(),
            signature: String::new(),
            start_line,
            end_line: end_line.max(start_line),
            doc_comment: String::new(),
            parent_name: String::new(),
            imports: Vec::new(),
        };
        chunk.id = chunk.compute_id();
        chunk
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn with_doc_comment(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = doc.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = parent.into();
        self
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    /// Deterministic id: first 8 bytes of sha256 over the identity tuple, hex encoded
    pub fn compute_id(&self) -> String {
        let key = format!(
            "{}:{}:{}:{}",
            self.file_path, self.kind, self.name, self.start_line
        );
        let digest = Sha256::digest(key.as_bytes());
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// A chunk together with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A single ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Similarity for vector hits, BM25 score for keyword hits, fused score for hybrid hits
    pub score: f32,
    /// `1 - score` for similarity-based stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            distance: None,
        }
    }

    pub fn from_similarity(chunk: Chunk, similarity: f32) -> Self {
        Self {
            chunk,
            score: similarity,
            distance: Some(1.0 - similarity),
        }
    }
}

/// Descriptive metadata about one indexing run over a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub path: String,
    pub name: String,
    pub languages: Vec<String>,
    pub total_files: usize,
    pub total_chunks: usize,
    /// RFC 3339 timestamp
    pub indexed_at: String,
}

/// Aggregate counts over the chunks of one indexing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexStats {
    pub total_files: usize,
    pub total_chunks: usize,
    pub chunks_by_kind: BTreeMap<String, usize>,
    pub chunks_by_language: BTreeMap<String, usize>,
    pub average_chunks_per_file: f64,
}

/// Outcome of pushing a chunk set through the retriever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IndexReport {
    /// Chunks handed to the keyword index
    pub chunks: usize,
    /// Chunks that received an embedding and were stored
    pub embedded: usize,
    /// Chunks whose embedding failed after retries
    pub failed: usize,
}
