//! Live queries.
//!
//! [`DocumentStore::listen`] runs a query once, hands the result to a callback,
//! then re-runs it after every committed write to the query's collection until
//! the returned [`ListenerRegistration`] is removed or dropped.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::document::{Document, Query};
use crate::errors::Result;
use crate::store::DocumentStore;

/// Callback invoked with every query snapshot.
pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Handle to a running live query. Dropping it stops the listener.
#[derive(Debug)]
pub struct ListenerRegistration {
    task: Option<JoinHandle<()>>,
}

impl ListenerRegistration {
    /// Stop delivering snapshots. Calling it more than once is a no-op.
    pub fn remove(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("listener removed");
        }
    }

    /// Whether the listener is still attached.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl DocumentStore {
    /// Start a live query.
    ///
    /// The first snapshot is read synchronously, so a failing query is
    /// reported here rather than inside the listener. Snapshots are delivered
    /// in commit order on a tokio task; must be called within a tokio runtime.
    /// A re-query that fails later is logged and skipped.
    pub fn listen(
        &self,
        query: Query,
        on_snapshot: SnapshotCallback,
    ) -> Result<ListenerRegistration> {
        // subscribe before the initial read so no write slips between them
        let mut changes = self.changes();
        let initial = self.query(&query)?;
        let store = self.clone();

        let task = tokio::spawn(async move {
            on_snapshot(initial);
            loop {
                match changes.recv().await {
                    Ok(change) if change.collection != query.collection => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(lagged = n, collection = %query.collection, "listener lagged, re-reading");
                    }
                    Err(RecvError::Closed) => break,
                }
                match store.query(&query) {
                    Ok(documents) => on_snapshot(documents),
                    Err(e) => {
                        warn!(error = %e, collection = %query.collection, "live query failed");
                    }
                }
            }
        });

        Ok(ListenerRegistration { task: Some(task) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::document::DocumentWrite;

    fn collect(tx: mpsc::UnboundedSender<Vec<Document>>) -> SnapshotCallback {
        Arc::new(move |docs| {
            let _ = tx.send(docs);
        })
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Vec<Document>>) -> Vec<Document> {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("snapshot in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn delivers_initial_and_subsequent_snapshots() {
        let store = DocumentStore::open_in_memory().unwrap();
        let _ = store.add("tasks", DocumentWrite::new().set("owner", "u1")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _reg = store
            .listen(Query::collection("tasks").where_eq("owner", "u1"), collect(tx))
            .unwrap();

        assert_eq!(next(&mut rx).await.len(), 1);

        let _ = store.add("tasks", DocumentWrite::new().set("owner", "u1")).unwrap();
        assert_eq!(next(&mut rx).await.len(), 2);
    }

    #[tokio::test]
    async fn ignores_other_collections() {
        let store = DocumentStore::open_in_memory().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _reg = store.listen(Query::collection("tasks"), collect(tx)).unwrap();
        assert!(next(&mut rx).await.is_empty());

        let _ = store.add("users", DocumentWrite::new().set("x", 1)).unwrap();
        let _ = store.add("tasks", DocumentWrite::new().set("x", 2)).unwrap();

        // the users write produced no snapshot; the next one reflects the task
        let docs = next(&mut rx).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["x"], 2);
    }

    #[tokio::test]
    async fn remove_stops_delivery() {
        let store = DocumentStore::open_in_memory().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reg = store.listen(Query::collection("tasks"), collect(tx)).unwrap();
        let _ = next(&mut rx).await;
        assert!(reg.is_active());

        reg.remove();
        reg.remove();
        assert!(!reg.is_active());

        let _ = store.add("tasks", DocumentWrite::new().set("x", 1)).unwrap();
        // the aborted task drops its sender, closing the channel
        let result = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn invalid_query_fails_up_front() {
        let store = DocumentStore::open_in_memory().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = store.listen(Query::collection("tasks").where_eq("bad field", 1), collect(tx));
        assert!(result.is_err());
    }
}
