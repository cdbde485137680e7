use super::VectorStore;
use crate::error::VectorDbError;
use crate::types::{EmbeddedChunk, SearchResult};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Brute-force vector store held in memory
///
/// Search scores every stored vector with cosine similarity. When a
/// storage path is set, each mutation rewrites the whole map to that file
/// as a JSON array of `{chunk, embedding}` records.
pub struct MemoryStore {
    items: RwLock<HashMap<String, EmbeddedChunk>>,
    storage_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Store with no backing file
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            storage_path: None,
        }
    }

    /// Open a store, loading `storage_path` if it exists
    ///
    /// A missing file is an empty store; unreadable or undecodable files are errors.
    pub fn open(storage_path: Option<PathBuf>) -> Result<Self> {
        let items = match &storage_path {
            Some(path) => load(path)?,
            None => HashMap::new(),
        };

        if let Some(path) = &storage_path {
            tracing::info!(
                "Opened memory store at {} with {} vectors",
                path.display(),
                items.len()
            );
        }

        Ok(Self {
            items: RwLock::new(items),
            storage_path,
        })
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, EmbeddedChunk>>> {
        self.items
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, EmbeddedChunk>>> {
        self.items
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Rewrite the backing file; called with the write lock held
    fn persist(&self, items: &HashMap<String, EmbeddedChunk>) -> Result<()> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };

        let persist_failed = |reason: String| VectorDbError::PersistFailed {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| persist_failed(e.to_string()))?;
        }

        let mut records: Vec<&EmbeddedChunk> = items.values().collect();
        records.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
        let json = serde_json::to_vec(&records).map_err(|e| persist_failed(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| persist_failed(e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| persist_failed(e.to_string()))?;

        tracing::debug!("Persisted {} vectors to {}", records.len(), path.display());
        Ok(())
    }

    /// Apply `change` so that memory only moves once the file has been written
    ///
    /// With a backing file the change runs on a copy that replaces the live
    /// map after a successful persist; a persist error leaves both untouched.
    fn commit<R>(
        &self,
        map: &mut HashMap<String, EmbeddedChunk>,
        change: impl FnOnce(&mut HashMap<String, EmbeddedChunk>) -> R,
    ) -> Result<R> {
        if self.storage_path.is_none() {
            return Ok(change(map));
        }

        let mut next = map.clone();
        let outcome = change(&mut next);
        self.persist(&next)?;
        *map = next;
        Ok(outcome)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn load(path: &Path) -> Result<HashMap<String, EmbeddedChunk>> {
    let load_failed = |reason: String| VectorDbError::LoadFailed {
        path: path.display().to_string(),
        reason,
    };

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(load_failed(e.to_string()).into()),
    };

    let records: Vec<EmbeddedChunk> =
        serde_json::from_slice(&bytes).map_err(|e| load_failed(e.to_string()))?;

    Ok(records
        .into_iter()
        .map(|item| (item.chunk.id.clone(), item))
        .collect())
}

/// Cosine similarity of two vectors
///
/// Returns 0 when the lengths differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    async fn insert(&self, items: Vec<EmbeddedChunk>) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let count = items.len();
        let mut map = self.write()?;
        self.commit(&mut map, |map| {
            for item in items {
                map.insert(item.chunk.id.clone(), item);
            }
        })?;

        tracing::debug!("Upserted {} vectors ({} stored)", count, map.len());
        Ok(count)
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let map = self.read()?;
        let mut scored: Vec<(f32, &EmbeddedChunk)> = map
            .values()
            .map(|item| (cosine_similarity(query, &item.embedding), item))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.chunk.id.cmp(&b.1.chunk.id))
        });
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(score, item)| SearchResult::from_similarity(item.chunk.clone(), score))
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut map = self.write()?;
        if !ids.iter().any(|id| map.contains_key(id)) {
            return Ok(0);
        }
        self.commit(&mut map, |map| {
            ids.iter().filter(|id| map.remove(*id).is_some()).count()
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut map = self.write()?;
        self.commit(&mut map, |map| map.clear())?;
        tracing::info!("Cleared memory store");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn close(&self) -> Result<()> {
        let map = self.read()?;
        self.persist(&map)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
