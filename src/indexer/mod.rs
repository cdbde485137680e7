//! Source scanning and chunking
//!
//! Walks a repository, splits every eligible file into [`Chunk`]s and
//! reports what was found. Scanning and chunking are CPU-bound and run
//! synchronously; chunking of independent files is spread over rayon's pool.

mod ast_parser;
mod chunker;
mod file_info;
mod file_walker;
pub mod language;

pub use ast_parser::AstParser;
pub use chunker::{CodeChunker, whole_file_chunk};
pub use file_info::FileInfo;
pub use file_walker::{FileWalker, WalkOutcome};

use crate::config::{ChunkingConfig, ScannerConfig};
use crate::error::ScanError;
use crate::types::{Chunk, IndexStats, RepositoryInfo};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

/// Everything produced by one pass over a repository
#[derive(Debug, Clone)]
pub struct IndexResult {
    pub repository: RepositoryInfo,
    pub chunks: Vec<Chunk>,
    /// Per-file failures, formatted; those files contributed no chunks
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

impl IndexResult {
    /// Chunk counts broken down by kind and language
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            total_files: self.repository.total_files,
            total_chunks: self.repository.total_chunks,
            ..Default::default()
        };

        for chunk in &self.chunks {
            *stats
                .chunks_by_kind
                .entry(chunk.kind.to_string())
                .or_insert(0) += 1;
            *stats
                .chunks_by_language
                .entry(chunk.language.clone())
                .or_insert(0) += 1;
        }

        if stats.total_files > 0 {
            stats.average_chunks_per_file = stats.total_chunks as f64 / stats.total_files as f64;
        }

        stats
    }
}

/// Scanner and chunker wired together
#[derive(Debug, Clone)]
pub struct Indexer {
    scanner: ScannerConfig,
    chunker: CodeChunker,
}

impl Indexer {
    pub fn new(scanner: ScannerConfig, chunking: &ChunkingConfig) -> Self {
        Self {
            scanner,
            chunker: CodeChunker::from_config(chunking),
        }
    }

    pub fn chunker(&self) -> &CodeChunker {
        &self.chunker
    }

    /// Scan `repo_path` and chunk every eligible file
    ///
    /// Fails when the path is not a readable directory or holds no eligible
    /// files. Unreadable individual files are listed in
    /// [`IndexResult::errors`] and skipped.
    pub fn index_repository(&self, repo_path: impl AsRef<Path>) -> Result<IndexResult> {
        let started = Instant::now();
        let root = repo_path.as_ref();

        let absolute = std::fs::canonicalize(root)
            .map_err(|_| ScanError::DirectoryNotFound(root.display().to_string()))?;
        if !absolute.is_dir() {
            return Err(ScanError::NotADirectory(absolute.display().to_string()).into());
        }

        let walk = FileWalker::new(&absolute, &self.scanner)
            .walk()
            .with_context(|| format!("Failed to scan directory {}", absolute.display()))?;

        if walk.files.is_empty() {
            return Err(ScanError::NoFilesFound(absolute.display().to_string()).into());
        }

        let mut errors: Vec<String> = walk.errors.iter().map(|e| e.to_string()).collect();

        let per_file: Vec<std::result::Result<Vec<Chunk>, ScanError>> = walk
            .files
            .par_iter()
            .map(|file| self.chunk_one(file))
            .collect();

        let mut chunks = Vec::new();
        for outcome in per_file {
            match outcome {
                Ok(file_chunks) => chunks.extend(file_chunks),
                Err(e) => {
                    tracing::warn!("{}", e);
                    errors.push(e.to_string());
                }
            }
        }

        let languages: BTreeSet<String> = chunks.iter().map(|c| c.language.clone()).collect();
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| absolute.display().to_string());

        let repository = RepositoryInfo {
            path: absolute.display().to_string(),
            name,
            languages: languages.into_iter().collect(),
            total_files: walk.files.len(),
            total_chunks: chunks.len(),
            indexed_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!(
            "Chunked {} files into {} chunks ({} errors) in {:?}",
            repository.total_files,
            repository.total_chunks,
            errors.len(),
            started.elapsed()
        );

        Ok(IndexResult {
            repository,
            chunks,
            errors,
            elapsed: started.elapsed(),
        })
    }

    fn chunk_one(&self, file: &FileInfo) -> std::result::Result<Vec<Chunk>, ScanError> {
        let content =
            std::fs::read_to_string(&file.path).map_err(|e| ScanError::FileReadFailed {
                file: file.relative_path.clone(),
                reason: e.to_string(),
            })?;
        let chunks = self.chunker.chunk_file(file, &content);
        tracing::debug!("{}: {} chunks", file.relative_path, chunks.len());
        Ok(chunks)
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new(ScannerConfig::default(), &ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;
    use std::fs;
    use tempfile::TempDir;

    fn indexer() -> Indexer {
        let scanner = ScannerConfig {
            extensions: vec!["go".to_string(), "txt".to_string()],
            ..Default::default()
        };
        Indexer::new(scanner, &ChunkingConfig::default())
    }

    #[test]
    fn test_index_missing_directory() {
        let err = indexer()
            .index_repository("/nonexistent/repo/98765")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_index_file_path_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("main.go");
        fs::write(&file, "package main").unwrap();

        let err = indexer().index_repository(&file).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_index_no_source_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let err = indexer().index_repository(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("No source files found"));
    }

    #[test]
    fn test_index_repository_metadata() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("main.go"),
            "package main\n\nfunc main() {}\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "some notes").unwrap();

        let result = indexer().index_repository(temp_dir.path()).unwrap();
        assert_eq!(result.repository.total_files, 2);
        assert_eq!(result.repository.total_chunks, result.chunks.len());
        assert_eq!(result.repository.languages, vec!["go", "text"]);
        assert!(result.errors.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&result.repository.indexed_at).is_ok());

        let expected_name = temp_dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(result.repository.name, expected_name);
    }

    #[test]
    fn test_non_utf8_file_is_recorded_and_skipped() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.txt"), [0xffu8, 0xfe, 0xfd]).unwrap();
        fs::write(temp_dir.path().join("good.txt"), "fine").unwrap();

        let result = indexer().index_repository(temp_dir.path()).unwrap();
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("bad.txt"));
    }

    #[test]
    fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("lib.go"),
            "package lib\n\nfunc A() {}\n\nfunc B() {}\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("readme.txt"), "read me").unwrap();

        let result = indexer().index_repository(temp_dir.path()).unwrap();
        let stats = result.stats();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_chunks, 4);
        assert_eq!(stats.chunks_by_kind.get("function"), Some(&2));
        assert_eq!(stats.chunks_by_kind.get("package"), Some(&1));
        assert_eq!(stats.chunks_by_kind.get("file"), Some(&1));
        assert_eq!(stats.chunks_by_language.get("go"), Some(&3));
        assert_eq!(stats.average_chunks_per_file, 2.0);
        assert!(result.chunks.iter().any(|c| c.kind == ChunkKind::File));
    }

    #[test]
    fn test_reindex_yields_same_ids() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("lib.go"),
            "package lib\n\nfunc A() {}\n",
        )
        .unwrap();

        let first = indexer().index_repository(temp_dir.path()).unwrap();
        let second = indexer().index_repository(temp_dir.path()).unwrap();
        let ids = |r: &IndexResult| r.chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}
