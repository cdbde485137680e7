use super::{EmbeddingProvider, ProviderHealth, check_status, http_client, request_failed};
use crate::error::EmbeddingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embeddings from a local Ollama server (`POST /api/embeddings`)
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, dimension: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;

        let body: EmbeddingResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| EmbeddingError::DecodeFailed(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(EmbeddingError::DecodeFailed("empty embedding".to_string()).into());
        }
        Ok(body.embedding)
    }

    /// Ollama has no batch endpoint; texts are embedded one at a time
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (idx, text) in texts.iter().enumerate() {
            let embedding = self
                .embed(text)
                .await
                .with_context(|| format!("Failed to embed text {}", idx))?;
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    async fn health(&self) -> Result<ProviderHealth> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_failed(&url, e))?;
        check_status(response).await?;

        Ok(ProviderHealth {
            status: "ok".to_string(),
            model: self.model.clone(),
            device: None,
            dimension: self.dimension,
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
