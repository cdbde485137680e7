/// End-to-end indexing and search over a small fixture tree
use anyhow::Result;
use code_retriever::bm25_search::tokenize;
use code_retriever::config::Config;
use code_retriever::embedding::ProviderHealth;
use code_retriever::{ChunkKind, EmbeddingProvider, RetrieverClient};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DIM: usize = 256;

const STORE_GO: &str = r#"package store

import (
	"crypto/sha256"
	"fmt"
)

// Record is one stored entry.
type Record struct {
	Key   string
	Value []byte
}

// ComputeChecksum hashes a record value.
func ComputeChecksum(r Record) string {
	sum := sha256.Sum256(r.Value)
	return fmt.Sprintf("%x", sum)
}

// FormatRecord renders a record for logs.
func FormatRecord(r Record) string {
	return fmt.Sprintf("%s=%d bytes", r.Key, len(r.Value))
}
"#;

struct TokenHashProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for TokenHashProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; DIM];
        for token in tokenize(text) {
            let hash = token
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            vector[hash as usize % DIM] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn health(&self) -> Result<ProviderHealth> {
        Ok(ProviderHealth::default())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "token-hash"
    }
}

fn write_fixture(root: &Path) -> Result<()> {
    std::fs::write(root.join("store.go"), STORE_GO)?;
    std::fs::write(root.join("notes.md"), "# Notes\n\nChecksums are hex encoded.\n")?;

    let long: String = (0..100).map(|i| format!("{:0>39}\n", i)).collect();
    std::fs::write(root.join("long.txt"), long)?;

    // ignored directory and extension
    std::fs::create_dir_all(root.join("vendor"))?;
    std::fs::write(root.join("vendor").join("dep.go"), "package dep\n")?;
    std::fs::write(root.join("image.png"), [0u8, 1, 2])?;
    Ok(())
}

fn fixture_config(store_dir: &Path) -> Config {
    let mut config = Config::default();
    config.scanner.extensions = vec!["go".into(), ".MD".into(), "txt".into()];
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 40;
    config.embedding.dimension = DIM;
    config.embedding.retry_backoff_ms = 1;
    config.vector_db.storage_path = Some(store_dir.join("vectors.json"));
    config
}

#[tokio::test]
async fn test_index_and_search_fixture_tree() -> Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let repo = TempDir::new()?;
    let store = TempDir::new()?;
    write_fixture(repo.path())?;

    let client =
        RetrieverClient::with_provider(fixture_config(store.path()), Arc::new(TokenHashProvider))
            .await?;
    let cancel = CancellationToken::new();

    let report = client.index_directory(repo.path(), None, &cancel).await?;
    assert_eq!(report.repository.total_files, 3);
    assert!(report.errors.is_empty());

    let kinds = &report.stats.chunks_by_kind;
    assert_eq!(kinds.get("function"), Some(&2));
    assert_eq!(kinds.get("struct"), Some(&1));
    assert_eq!(kinds.get("file"), Some(&1));
    // 101 split lines, 39 chars average: 10-line windows stepping by 8
    assert_eq!(kinds.get("generic"), Some(&13));

    assert_eq!(report.index.failed, 0);
    assert_eq!(client.count().await?, report.index.chunks);

    let results = client.search("ComputeChecksum", 5, &cancel).await?;
    let top = &results[0].chunk;
    assert_eq!(top.name, "ComputeChecksum");
    assert_eq!(top.kind, ChunkKind::Function);
    assert_eq!(top.file_path, "store.go");
    assert_eq!(top.doc_comment, "ComputeChecksum hashes a record value.");
    assert_eq!(top.signature, "func ComputeChecksum(r Record) string");

    client.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_reindexing_is_idempotent() -> Result<()> {
    let repo = TempDir::new()?;
    let store = TempDir::new()?;
    write_fixture(repo.path())?;

    let mut config = fixture_config(store.path());
    config.indexing.reuse_existing = false;
    let client = RetrieverClient::with_provider(config, Arc::new(TokenHashProvider)).await?;
    let cancel = CancellationToken::new();

    let first = client.index_directory(repo.path(), None, &cancel).await?;
    let after_first = client.count().await?;
    let second = client.index_directory(repo.path(), None, &cancel).await?;

    assert_eq!(client.count().await?, after_first);
    assert_eq!(second.index.chunks, first.index.chunks);
    assert_eq!(second.index.embedded, first.index.embedded);
    Ok(())
}

#[tokio::test]
async fn test_keyword_index_survives_restart_with_persisted_vectors() -> Result<()> {
    let repo = TempDir::new()?;
    let store = TempDir::new()?;
    write_fixture(repo.path())?;
    let cancel = CancellationToken::new();

    let first =
        RetrieverClient::with_provider(fixture_config(store.path()), Arc::new(TokenHashProvider))
            .await?;
    first.index_directory(repo.path(), None, &cancel).await?;
    first.close().await?;

    let second =
        RetrieverClient::with_provider(fixture_config(store.path()), Arc::new(TokenHashProvider))
            .await?;
    let report = second.index_directory(repo.path(), None, &cancel).await?;
    assert!(report.reused_existing);

    let results = second.search("FormatRecord", 3, &cancel).await?;
    assert_eq!(results[0].chunk.name, "FormatRecord");
    Ok(())
}
