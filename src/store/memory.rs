//! In-process document store for offline play and tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use super::{Document, DocumentStore, Fields, StoreError};

/// Document store kept in memory, keyed by full document path
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<DashMap<String, Fields>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail as if the backend were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(StoreError::Api {
                status: 503,
                body: "store offline".to_string(),
            });
        }
        Ok(())
    }

    fn doc_id(path: &str) -> String {
        path.rsplit('/').next().unwrap_or_default().to_string()
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_online()?;
        Ok(self.docs.get(path).map(|entry| Document {
            id: Self::doc_id(path),
            fields: entry.value().clone(),
        }))
    }

    async fn set(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.docs.insert(path.to_string(), fields);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut entry = self
            .docs
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        entry.value_mut().extend(fields);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.docs.remove(path);
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.ensure_online()?;
        let prefix = format!("{}/", collection.trim_end_matches('/'));

        let mut documents: Vec<Document> = self
            .docs
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(Document {
                    id: rest.to_string(),
                    fields: entry.value().clone(),
                })
            })
            .collect();

        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }
}
