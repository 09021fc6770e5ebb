//! Collection watch: polls a collection and emits full snapshots on change

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{Document, DocumentStore};

/// Spawn a task that lists `collection` every `poll` and sends the complete
/// document set whenever it differs from the last one sent.
/// The task ends when the receiver is dropped.
pub fn spawn_collection_watch<S: DocumentStore>(
    store: S,
    collection: String,
    poll: Duration,
    tx: mpsc::Sender<Vec<Document>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<Vec<Document>> = None;

        loop {
            ticker.tick().await;

            if tx.is_closed() {
                break;
            }

            match store.list(&collection).await {
                Ok(docs) => {
                    if last.as_ref() == Some(&docs) {
                        continue;
                    }
                    last = Some(docs.clone());
                    if tx.send(docs).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "Collection watch failed");
                }
            }
        }

        debug!(collection = %collection, "Collection watch stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fields, MemoryStore};
    use serde_json::json;

    #[tokio::test]
    async fn test_watch_emits_on_change_only() {
        let store = MemoryStore::new();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_collection_watch(
            store.clone(),
            "lobbies/AB12C/players".to_string(),
            Duration::from_millis(5),
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert!(first.is_empty());

        let fields: Fields = json!({ "score": 2 }).as_object().cloned().unwrap();
        store.set("lobbies/AB12C/players/p1", fields).await.unwrap();

        let second = rx.recv().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].fields["score"], json!(2));

        // Unchanged collection: nothing new within several poll periods
        let quiet = tokio::time::timeout(Duration::from_millis(40), rx.recv()).await;
        assert!(quiet.is_err());

        drop(rx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_survives_store_failures() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = spawn_collection_watch(
            store.clone(),
            "lobbies/AB12C/players".to_string(),
            Duration::from_millis(5),
            tx,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set_offline(false);

        let docs = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(docs.is_empty());
    }
}
