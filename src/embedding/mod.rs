//! Embedding providers and the bounded-concurrency embedding pipeline

mod http_provider;
mod ollama;
mod pipeline;
pub mod template;

pub use http_provider::HttpEmbeddingProvider;
pub use ollama::OllamaProvider;
pub use pipeline::{EmbedReport, EmbeddingPipeline, PipelineSettings, ProgressCallback};
pub use template::InputTemplate;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Health information reported by an embedding backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderHealth {
    pub status: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub dimension: usize,
}

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of text, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Probe the backend
    async fn health(&self) -> Result<ProviderHealth>;

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// How chunks should be rendered before being sent to this provider
    fn input_template(&self) -> InputTemplate {
        InputTemplate::Descriptive
    }
}

/// Shared HTTP client with the configured request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .user_agent(concat!("code-retriever/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Build the provider named in the configuration
pub fn provider_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "http" => Arc::new(
            HttpEmbeddingProvider::new(&config.host, config.dimension, timeout)?
                .with_max_length(config.max_length),
        ),
        "ollama" => Arc::new(OllamaProvider::new(
            &config.ollama_host,
            &config.ollama_model,
            config.dimension,
            timeout,
        )?),
        other => return Err(EmbeddingError::UnknownProvider(other.to_string()).into()),
    };

    tracing::info!(
        "Using {} embedding provider (dimension {})",
        provider.model_name(),
        provider.dimension()
    );
    Ok(provider)
}

/// Turn a non-success response into an [`EmbeddingError::BadStatus`]
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EmbeddingError::BadStatus {
        status: status.as_u16(),
        body,
    }
    .into())
}

/// Wrap a transport error with the endpoint it was sent to
pub(crate) fn request_failed(endpoint: &str, err: reqwest::Error) -> anyhow::Error {
    EmbeddingError::RequestFailed {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config_http() {
        let config = EmbeddingConfig::default();
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.dimension(), 768);
        assert_eq!(provider.input_template(), InputTemplate::CodeFirst);
    }

    #[test]
    fn test_provider_from_config_ollama() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.model_name(), "nomic-embed-text");
        assert_eq!(provider.input_template(), InputTemplate::Descriptive);
    }

    #[test]
    fn test_provider_from_config_unknown() {
        let config = EmbeddingConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        let err = provider_from_config(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<EmbeddingError>(),
            Some(EmbeddingError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_health_deserializes_without_device() {
        let health: ProviderHealth =
            serde_json::from_str(r#"{"status":"ok","model":"codebert","dimension":768}"#).unwrap();
        assert_eq!(health.status, "ok");
        assert!(health.device.is_none());
    }
}
