use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, PipelineError};
use crate::types::{Chunk, EmbeddedChunk};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Called with `(embedded_so_far, total)` after every successful chunk
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Concurrency, retry and acceptance policy for one pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub concurrency: usize,
    pub max_retries: usize,
    pub retry_backoff: Duration,
    pub min_success_ratio: f64,
    pub max_input_chars: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            min_success_ratio: config.min_success_ratio,
            max_input_chars: config.max_input_chars,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

/// Results of one pipeline run
///
/// `embedded` is in completion order; every entry carries its source chunk.
#[derive(Debug, Clone, Default)]
pub struct EmbedReport {
    pub embedded: Vec<EmbeddedChunk>,
    pub failed: usize,
    pub total: usize,
}

impl EmbedReport {
    pub fn success_ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.embedded.len() as f64 / self.total as f64
        }
    }

    /// Chunks neither embedded nor failed, i.e. dropped by cancellation
    pub fn skipped(&self) -> usize {
        self.total
            .saturating_sub(self.embedded.len())
            .saturating_sub(self.failed)
    }
}

#[derive(Default)]
struct Accumulator {
    embedded: Vec<EmbeddedChunk>,
    failed: usize,
}

/// Turns chunks into vectors through an [`EmbeddingProvider`]
///
/// One task per chunk, at most `concurrency` provider calls in flight.
/// A chunk that still fails after `max_retries` attempts is counted and
/// dropped without affecting its siblings.
pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    settings: PipelineSettings,
}

impl EmbeddingPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, settings: PipelineSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Embed every chunk
    ///
    /// Succeeds when the embedded share reaches `min_success_ratio`; otherwise,
    /// or when `cancel` fires, the partial results travel inside the error.
    pub async fn embed(
        &self,
        chunks: &[Chunk],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<EmbedReport, PipelineError> {
        let total = chunks.len();
        if total == 0 {
            return Ok(EmbedReport::default());
        }

        let template = self.provider.input_template();
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let state = Arc::new(Mutex::new(Accumulator {
            embedded: Vec::with_capacity(total),
            failed: 0,
        }));
        let mut tasks = JoinSet::new();

        for chunk in chunks.iter().cloned() {
            let provider = Arc::clone(&self.provider);
            let settings = self.settings.clone();
            let semaphore = Arc::clone(&semaphore);
            let state = Arc::clone(&state);
            let progress = progress.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let text = template.render(&chunk, settings.max_input_chars);
                match embed_with_retry(provider.as_ref(), &text, &settings, &cancel).await {
                    Ok(embedding) => {
                        let mut acc = state.lock().await;
                        acc.embedded.push(EmbeddedChunk { chunk, embedding });
                        if let Some(progress) = &progress {
                            progress(acc.embedded.len(), total);
                        }
                    }
                    Err(_) if cancel.is_cancelled() => {}
                    Err(e) => {
                        tracing::warn!(
                            "Failed to embed chunk {} ({}:{}): {:#}",
                            chunk.id,
                            chunk.file_path,
                            chunk.start_line,
                            e
                        );
                        state.lock().await.failed += 1;
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Embedding task did not complete: {}", e);
                state.lock().await.failed += 1;
            }
        }

        let acc = std::mem::take(&mut *state.lock().await);
        let report = EmbedReport {
            embedded: acc.embedded,
            failed: acc.failed,
            total,
        };

        if cancel.is_cancelled() {
            tracing::info!(
                "Embedding cancelled: {}/{} chunks embedded",
                report.embedded.len(),
                total
            );
            return Err(PipelineError::Cancelled(report));
        }

        if report.success_ratio() < self.settings.min_success_ratio {
            return Err(PipelineError::TooManyFailures(report));
        }

        if report.failed > 0 {
            tracing::warn!(
                "{} chunks failed to embed, continuing with {}",
                report.failed,
                report.embedded.len()
            );
        } else {
            tracing::info!("Embedded {} chunks", report.embedded.len());
        }

        Ok(report)
    }

    /// Embed a search query with the same retry policy as chunks
    pub async fn embed_query(&self, query: &str, cancel: &CancellationToken) -> Result<Vec<f32>> {
        let text = super::template::truncate_chars(query.to_string(), self.settings.max_input_chars);
        embed_with_retry(self.provider.as_ref(), &text, &self.settings, cancel).await
    }

    /// Embed a probe string and compare its length with the declared dimension
    pub async fn probe_dimension(&self, cancel: &CancellationToken) -> Result<usize> {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled.into()),
            attempt = self.provider.embed("test") => attempt,
        };
        let actual = attempt?.len();
        let expected = self.provider.dimension();
        if actual != expected {
            return Err(EmbeddingError::DimensionMismatch { expected, actual }.into());
        }
        Ok(actual)
    }
}

/// Call the provider up to `max_retries` times with linear backoff
async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    text: &str,
    settings: &PipelineSettings,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    let attempts = settings.max_retries.max(1);
    let expected = provider.dimension();
    let mut last_error = None;

    for attempt in 0..attempts {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled.into()),
            outcome = provider.embed(text) => outcome,
        };

        match outcome {
            Ok(embedding) if embedding.len() == expected => return Ok(embedding),
            // a wrong-sized vector will not fix itself on retry
            Ok(embedding) => {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                }
                .into());
            }
            Err(e) => {
                tracing::debug!(
                    "Embedding attempt {}/{} failed: {:#}",
                    attempt + 1,
                    attempts,
                    e
                );
                // untyped errors are treated as transient
                if e
                    .downcast_ref::<EmbeddingError>()
                    .is_some_and(|err| !err.is_retryable())
                {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }

        if attempt + 1 < attempts {
            let delay = settings.retry_backoff * (attempt as u32 + 1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no embedding attempt was made")))
}
