//! Remote document store: Firestore REST client, in-memory store and the
//! lobby/player documents the game keeps in them

pub mod firestore;
pub mod lobby;
pub mod memory;
pub mod value;
pub mod watch;

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub use firestore::FirestoreClient;
pub use lobby::{LobbyError, LobbyStore, PlayerDoc};
pub use memory::MemoryStore;

/// Plain JSON fields of a document
pub type Fields = Map<String, Value>;

/// A document read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Last path segment (the document id)
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Deserialize the document fields into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| StoreError::Decode(format!("{}: {}", self.id, e)))
    }
}

/// Serialize a typed record into document fields
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Decode(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(StoreError::Decode(e.to_string())),
    }
}

/// Key/value document store with collection listing.
/// Paths are slash separated (`lobbies/ABCDE/players/p1`).
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Point read; `None` if the document does not exist
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Create or overwrite a document
    fn set(&self, path: &str, fields: Fields) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merge fields into an existing document; `NotFound` if it is missing
    fn update(
        &self,
        path: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a document (deleting a missing document is not an error)
    fn delete(&self, path: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All documents directly under a collection, ordered by id
    fn list(&self, collection: &str) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

/// Store backend selected at startup
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Firestore(FirestoreClient),
}

impl Store {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Firestore(_) => "firestore",
        }
    }
}

impl DocumentStore for Store {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        match self {
            Store::Memory(s) => s.get(path).await,
            Store::Firestore(s) => s.get(path).await,
        }
    }

    async fn set(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.set(path, fields).await,
            Store::Firestore(s) => s.set(path, fields).await,
        }
    }

    async fn update(&self, path: &str, fields: Fields) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.update(path, fields).await,
            Store::Firestore(s) => s.update(path, fields).await,
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        match self {
            Store::Memory(s) => s.delete(path).await,
            Store::Firestore(s) => s.delete(path).await,
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        match self {
            Store::Memory(s) => s.list(collection).await,
            Store::Firestore(s) => s.list(collection).await,
        }
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to decode document: {0}")]
    Decode(String),
}
