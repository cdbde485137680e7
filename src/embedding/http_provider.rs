use super::{
    EmbeddingProvider, InputTemplate, ProviderHealth, check_status, http_client, request_failed,
};
use crate::error::EmbeddingError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_LENGTH: usize = 512;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    texts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
    #[serde(default)]
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    count: usize,
}

/// Client for a CodeBERT-style embedding service
///
/// Endpoints: `POST /embed`, `POST /embed/batch`, `GET /health`.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
    max_length: Option<usize>,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, dimension: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
            max_length: Some(DEFAULT_MAX_LENGTH),
        })
    }

    /// Token budget sent with each request; 0 leaves it to the service
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = (max_length > 0).then_some(max_length);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.url("/embed");
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                text,
                max_length: self.max_length,
            })
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        let body: EmbedResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::DecodeFailed(e.to_string()))?;

        if body.dimension != 0 && body.dimension != body.embedding.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: body.dimension,
                actual: body.embedding.len(),
            }
            .into());
        }

        Ok(body.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url("/embed/batch");
        let response = self
            .client
            .post(&url)
            .json(&BatchRequest {
                texts,
                max_length: self.max_length,
            })
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        let body: BatchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::DecodeFailed(e.to_string()))?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbeddingError::DecodeFailed(format!(
                "expected {} embeddings, got {} (count {})",
                texts.len(),
                body.embeddings.len(),
                body.count
            ))
            .into());
        }

        tracing::debug!(
            "Embedded batch of {} texts (dimension {})",
            body.embeddings.len(),
            body.dimension
        );
        Ok(body.embeddings)
    }

    async fn health(&self) -> Result<ProviderHealth> {
        let url = self.url("/health");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        let health: ProviderHealth = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::DecodeFailed(e.to_string()))?;

        if !matches!(health.status.as_str(), "ok" | "healthy") {
            return Err(EmbeddingError::Unhealthy(health.status).into());
        }
        Ok(health)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "codebert"
    }

    fn input_template(&self) -> InputTemplate {
        InputTemplate::CodeFirst
    }
}
