use super::*;
use crate::bm25_search::tokenize;
use crate::embedding::{EmbeddingProvider, PipelineSettings, ProviderHealth};
use crate::error::PipelineError;
use crate::types::ChunkKind;
use crate::vector_db::MemoryStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const DIM: usize = 256;

/// Bag-of-tokens embedding: each token bumps one hashed bucket
#[derive(Default)]
struct HashingProvider {
    fail_all: AtomicBool,
    fail_for: HashSet<String>,
}

fn bucket(token: &str) -> usize {
    let mut hash: u32 = 2166136261;
    for byte in token.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash as usize % DIM
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_all.load(Ordering::SeqCst) || self.fail_for.iter().any(|t| text.contains(t))
        {
            anyhow::bail!("provider offline");
        }
        let mut vector = vec![0.0; DIM];
        for token in tokenize(text) {
            vector[bucket(&token)] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::new();
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
        "hashing"
    }
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        concurrency: 2,
        max_retries: 2,
        retry_backoff: Duration::from_millis(1),
        min_success_ratio: 0.5,
        max_input_chars: 8000,
    }
}

fn retriever(provider: Arc<HashingProvider>) -> HybridRetriever {
    HybridRetriever::new(
        Arc::new(MemoryStore::new()),
        EmbeddingPipeline::new(provider, settings()),
    )
}

fn chunks() -> Vec<Chunk> {
    let func = |name: &str, body: &str, line| {
        Chunk::new(
            ChunkKind::Function,
            "store.go",
            "go",
            name,
            format!("func {name}() {{\n\t{body}\n}}"),
            line,
            line + 2,
        )
    };
    vec![
        func("OpenDatabase", "return sql.Open(driver, dsn)", 1),
        func("RenderTemplate", "return tmpl.Execute(writer, data)", 5),
        func("HashPassword", "return bcrypt.Generate(password)", 9),
        func("SendEmail", "return smtp.Send(message)", 13),
    ]
}

#[tokio::test]
async fn test_index_chunks_fills_both_indexes() {
    let retriever = retriever(Arc::default());
    let report = retriever
        .index_chunks(&chunks(), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.chunks, 4);
    assert_eq!(report.embedded, 4);
    assert_eq!(report.failed, 0);
    assert_eq!(retriever.count().await.unwrap(), 4);
    assert!(retriever.has_keyword_index().await);
}

#[tokio::test]
async fn test_reindex_is_idempotent() {
    let retriever = retriever(Arc::default());
    let cancel = CancellationToken::new();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();
    assert_eq!(retriever.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_search_ranks_exact_name_first() {
    let retriever = retriever(Arc::default());
    let cancel = CancellationToken::new();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();

    let results = retriever.search("HashPassword", 3, &cancel).await.unwrap();
    assert_eq!(results[0].chunk.name, "HashPassword");
    assert!(results.len() <= 3);

    let vector_only = retriever.vector_search("HashPassword", 1, &cancel).await.unwrap();
    assert_eq!(vector_only[0].chunk.name, "HashPassword");
    let keyword_only = retriever.keyword_search("HashPassword", 1).await;
    assert_eq!(keyword_only[0].chunk.name, "HashPassword");
}

#[tokio::test]
async fn test_query_embedding_failure_degrades_to_keywords() {
    let provider = Arc::new(HashingProvider::default());
    let retriever = retriever(provider.clone());
    let cancel = CancellationToken::new();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();

    provider.fail_all.store(true, Ordering::SeqCst);
    let results = retriever.search("SendEmail smtp", 2, &cancel).await.unwrap();
    let expected = retriever.keyword_search("SendEmail smtp", 2).await;

    assert_eq!(results, expected);
    assert_eq!(results[0].chunk.name, "SendEmail");
    assert!(retriever.vector_search("SendEmail", 2, &cancel).await.is_err());
}

#[tokio::test]
async fn test_pipeline_failure_keeps_keyword_index_and_partial_vectors() {
    let provider = Arc::new(HashingProvider {
        fail_all: AtomicBool::new(false),
        fail_for: ["sql", "tmpl", "bcrypt"]
            .into_iter()
            .map(String::from)
            .collect(),
    });
    let retriever = retriever(provider);

    let err = retriever
        .index_chunks(&chunks(), None, &CancellationToken::new())
        .await
        .unwrap_err();
    let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
    assert!(matches!(pipeline_err, PipelineError::TooManyFailures(_)));
    assert_eq!(pipeline_err.report().failed, 3);

    assert_eq!(retriever.count().await.unwrap(), 1);
    assert!(retriever.has_keyword_index().await);
    let results = retriever.keyword_search("RenderTemplate", 5).await;
    assert_eq!(results[0].chunk.name, "RenderTemplate");
}

#[tokio::test]
async fn test_weights_are_adjustable() {
    let retriever = retriever(Arc::default());
    assert_eq!(retriever.weights().await, FusionWeights::default());

    retriever.set_weights(0.1, 0.9).await;
    assert_eq!(
        retriever.weights().await,
        FusionWeights {
            vector: 0.1,
            keyword: 0.9
        }
    );
}

#[tokio::test]
async fn test_search_config_applies() {
    let config = SearchConfig {
        vector_weight: 0.4,
        keyword_weight: 0.6,
        candidate_multiplier: 0,
        ..Default::default()
    };
    let retriever = retriever(Arc::default()).with_search_config(&config);
    assert_eq!(retriever.weights().await.keyword, 0.6);
    assert_eq!(retriever.candidate_multiplier, 1);
}

#[tokio::test]
async fn test_clear_and_zero_limit() {
    let retriever = retriever(Arc::default());
    let cancel = CancellationToken::new();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();

    assert!(retriever.search("OpenDatabase", 0, &cancel).await.unwrap().is_empty());

    retriever.clear().await.unwrap();
    assert_eq!(retriever.count().await.unwrap(), 0);
    assert!(!retriever.has_keyword_index().await);
    assert!(retriever.search("OpenDatabase", 5, &cancel).await.unwrap().is_empty());
    retriever.close().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_search_is_an_error() {
    let retriever = retriever(Arc::default());
    let cancel = CancellationToken::new();
    retriever.index_chunks(&chunks(), None, &cancel).await.unwrap();

    cancel.cancel();
    assert!(retriever.search("OpenDatabase", 5, &cancel).await.is_err());
}
