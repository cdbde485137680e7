use super::VectorStore;
use crate::embedding::http_client;
use crate::error::VectorDbError;
use crate::types::{Chunk, ChunkKind, EmbeddedChunk, SearchResult};
use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::Duration;

const DEFAULT_BATCH_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunk fields as stored in a point payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PointPayload {
    chunk_id: String,
    content: String,
    file_path: String,
    language: String,
    chunk_type: ChunkKind,
    name: String,
    signature: String,
    start_line: usize,
    end_line: usize,
    doc_comment: String,
    parent_name: String,
    imports: Vec<String>,
}

impl From<&Chunk> for PointPayload {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            content: chunk.content.clone(),
            file_path: chunk.file_path.clone(),
            language: chunk.language.clone(),
            chunk_type: chunk.kind,
            name: chunk.name.clone(),
            signature: chunk.signature.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            doc_comment: chunk.doc_comment.clone(),
            parent_name: chunk.parent_name.clone(),
            imports: chunk.imports.clone(),
        }
    }
}

impl From<PointPayload> for Chunk {
    fn from(payload: PointPayload) -> Self {
        let mut chunk = Chunk::new(
            payload.chunk_type,
            payload.file_path,
            payload.language,
            payload.name,
            payload.content,
            payload.start_line,
            payload.end_line,
        )
        .with_signature(payload.signature)
        .with_doc_comment(payload.doc_comment)
        .with_parent(payload.parent_name)
        .with_imports(payload.imports);

        if !payload.chunk_id.is_empty() {
            chunk.id = payload.chunk_id;
        }
        chunk
    }
}

/// Numeric point id for a chunk id
///
/// Chunk ids are 8 bytes of hex, so they map onto a `u64` directly and a
/// re-inserted chunk overwrites its earlier point. Ids in any other format
/// are hashed down to 8 bytes.
fn point_id(chunk_id: &str) -> u64 {
    if chunk_id.len() == 16
        && let Ok(id) = u64::from_str_radix(chunk_id, 16)
    {
        return id;
    }
    let digest = Sha256::digest(chunk_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

#[derive(Debug, Serialize)]
struct Point {
    id: u64,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<PointPayload>,
}

/// Adapter for a Qdrant collection over its REST API
///
/// Qdrant only accepts integer or UUID point ids, so the hex chunk id is
/// read as a `u64` and also kept in the payload. Upserts overwrite by that
/// id. Deleting by chunk id is not supported precisely: `delete` drops and
/// recreates the collection.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
    batch_size: usize,
}

impl QdrantStore {
    /// Connect and make sure the collection exists
    pub async fn connect(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        tracing::info!("Connecting to Qdrant at {}", url);

        let store = Self {
            client: http_client(REQUEST_TIMEOUT)?,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dimension,
            batch_size: DEFAULT_BATCH_SIZE,
        };

        if !store.collection_exists().await? {
            store.create_collection().await?;
        }
        Ok(store)
    }

    /// Points per upsert request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        on_status: fn(String) -> VectorDbError,
    ) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(on_status(format!("status {}: {}", status.as_u16(), body)).into())
    }

    async fn collection_exists(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(VectorDbError::ConnectionFailed(format!(
                "unexpected status {} probing collection '{}'",
                status.as_u16(),
                self.collection
            ))
            .into()),
        }
    }

    async fn create_collection(&self) -> Result<()> {
        tracing::info!(
            "Creating collection '{}' with dimension {}",
            self.collection,
            self.dimension
        );

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.dimension, "distance": "Cosine" }
            }))
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VectorDbError::CollectionCreationFailed {
                collection: self.collection.clone(),
                reason: format!("status {}: {}", status.as_u16(), body),
            }
            .into());
        }
        Ok(())
    }

    async fn drop_collection(&self) -> Result<()> {
        self.send(
            self.client.delete(self.collection_url()),
            VectorDbError::ClearFailed,
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let total = items.len();
        let url = format!("{}/points?wait=true", self.collection_url());
        let mut items = items.into_iter().peekable();

        while items.peek().is_some() {
            let points: Vec<Point> = items
                .by_ref()
                .take(self.batch_size)
                .map(|item| Point {
                    id: point_id(&item.chunk.id),
                    payload: PointPayload::from(&item.chunk),
                    vector: item.embedding,
                })
                .collect();

            tracing::debug!("Upserting {} points into '{}'", points.len(), self.collection);
            self.send(
                self.client.put(&url).json(&json!({ "points": points })),
                VectorDbError::StoreFailed,
            )
            .await?;
        }

        Ok(total)
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = format!("{}/points/search", self.collection_url());
        let response = self
            .send(
                self.client.post(&url).json(&json!({
                    "vector": query,
                    "limit": limit,
                    "with_payload": true,
                })),
                VectorDbError::SearchFailed,
            )
            .await?;

        let body: Envelope<Vec<ScoredPoint>> = response
            .json()
            .await
            .map_err(|e| VectorDbError::SearchFailed(e.to_string()))?;

        Ok(body
            .result
            .into_iter()
            .filter_map(|point| {
                let payload = point.payload?;
                Some(SearchResult::from_similarity(Chunk::from(payload), point.score))
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = self.count().await?;
        tracing::warn!(
            "Qdrant store cannot delete {} chunks by id; clearing collection '{}' ({} points)",
            ids.len(),
            self.collection,
            removed
        );
        self.clear()
            .await
            .map_err(|e| VectorDbError::DeleteFailed(format!("{:#}", e)))?;
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.drop_collection().await?;
        self.create_collection().await?;
        tracing::info!("Cleared collection '{}'", self.collection);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .send(
                self.client.get(self.collection_url()),
                VectorDbError::CountFailed,
            )
            .await?;

        let body: Envelope<CollectionInfo> = response
            .json()
            .await
            .map_err(|e| VectorDbError::CountFailed(e.to_string()))?;
        Ok(body.result.points_count.unwrap_or(0) as usize)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip_keeps_chunk_id() {
        let chunk = Chunk::new(
            ChunkKind::Method,
            "pkg/list.go",
            "go",
            "Push",
            "func (l *List) Push() {}",
            4,
            6,
        )
        .with_parent("List")
        .with_signature("func (l *List) Push()");

        let back = Chunk::from(PointPayload::from(&chunk));
        assert_eq!(back, chunk);
    }

    #[test]
    fn test_point_id_follows_chunk_id() {
        let chunk = Chunk::new(ChunkKind::Function, "a.go", "go", "Run", "func Run() {}", 1, 1);
        let id = point_id(&chunk.id);
        assert_eq!(format!("{:016x}", id), chunk.id);
        assert_eq!(point_id("00000000000000ff"), 255);

        // foreign id formats still map to a stable number
        assert_eq!(point_id("not-hex"), point_id("not-hex"));
        assert_ne!(point_id("not-hex"), point_id("also-not-hex"));
    }

    #[test]
    fn test_sparse_payload_decodes() {
        let payload: PointPayload =
            serde_json::from_str(r#"{"file_path":"a.go","content":"x","start_line":3}"#).unwrap();
        let chunk = Chunk::from(payload);
        assert_eq!(chunk.kind, ChunkKind::Generic);
        assert_eq!(chunk.start_line, 3);
        assert_eq!(chunk.end_line, 3);
        assert_eq!(chunk.id, chunk.compute_id());
    }
}
