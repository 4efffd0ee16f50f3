//! The document store: collections of JSON documents over a pooled `SQLite`
//! database, with change notifications for live queries.
//!
//! Writes are last-writer-wins; there are no version checks. Every committed
//! write is announced on a broadcast channel as a [`DocumentChange`].

use std::path::Path;

use rusqlite::{OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use taskdeck_core::{DocumentId, Timestamp};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::document::{Direction, Document, DocumentWrite, Query, json_path};
use crate::errors::{Result, StoreError};

/// What happened to a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Newly created.
    Added,
    /// Fields changed.
    Modified,
    /// Deleted.
    Removed,
}

/// A committed write, as announced to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentChange {
    /// Collection of the written document.
    pub collection: String,
    /// Id of the written document.
    pub id: DocumentId,
    /// Kind of write.
    pub kind: ChangeKind,
}

/// How [`DocumentStore::set`] treats existing fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Overwrite,
    /// Merge top-level fields into the existing document (or create it).
    Merge,
}

/// Handle to the document store. Cheap to clone; clones share the pool and
/// the change channel.
#[derive(Clone)]
pub struct DocumentStore {
    pool: ConnectionPool,
    changes: broadcast::Sender<DocumentChange>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("listeners", &self.changes.receiver_count())
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Wrap an existing pool (schema must already exist).
    pub fn new(pool: ConnectionPool, change_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(change_buffer.max(1));
        Self { pool, changes }
    }

    /// Open an in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        Ok(Self::new(pool, 256))
    }

    /// Open (or create) a file-backed store.
    pub fn open(path: &Path, config: &ConnectionConfig, change_buffer: usize) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        Ok(Self::new(pool, change_buffer))
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Subscribe to committed writes across all collections.
    pub fn changes(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    fn announce(&self, collection: &str, id: &DocumentId, kind: ChangeKind) {
        // no receivers is not an error
        let _ = self.changes.send(DocumentChange {
            collection: collection.to_string(),
            id: id.clone(),
            kind,
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Create a document with a generated id.
    #[instrument(skip(self, write))]
    pub fn add(&self, collection: &str, write: DocumentWrite) -> Result<DocumentId> {
        let id = DocumentId::generate();
        let fields = write.resolve(Timestamp::now())?;
        let json = serde_json::to_string(&fields)?;
        {
            let conn = self.conn()?;
            let _ = conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
                params![collection, id.as_str(), json],
            )?;
        }
        debug!(%id, "document added");
        self.announce(collection, &id, ChangeKind::Added);
        Ok(id)
    }

    /// Write a document with a caller-chosen id.
    #[instrument(skip(self, write))]
    pub fn set(
        &self,
        collection: &str,
        id: &DocumentId,
        write: DocumentWrite,
        mode: SetMode,
    ) -> Result<()> {
        let incoming = write.resolve(Timestamp::now())?;
        let kind = {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let existing = read_data(&tx, collection, id)?;
            let kind = if existing.is_some() {
                ChangeKind::Modified
            } else {
                ChangeKind::Added
            };
            let fields = match (mode, existing) {
                (SetMode::Merge, Some(mut current)) => {
                    current.extend(incoming);
                    current
                }
                _ => incoming,
            };
            let json = serde_json::to_string(&fields)?;
            let _ = tx.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    data = excluded.data,
                    written_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![collection, id.as_str(), json],
            )?;
            tx.commit()?;
            kind
        };
        self.announce(collection, id, kind);
        Ok(())
    }

    /// Create a document with a caller-chosen id unless it already exists.
    /// Returns whether it was created; an existing document is left as is.
    #[instrument(skip(self, write))]
    pub fn create(&self, collection: &str, id: &DocumentId, write: DocumentWrite) -> Result<bool> {
        let fields = write.resolve(Timestamp::now())?;
        let json = serde_json::to_string(&fields)?;
        let inserted = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO NOTHING",
                params![collection, id.as_str(), json],
            )?
        };
        if inserted > 0 {
            debug!(%id, "document created");
            self.announce(collection, id, ChangeKind::Added);
        }
        Ok(inserted > 0)
    }

    /// Merge fields into an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    #[instrument(skip(self, write))]
    pub fn update(&self, collection: &str, id: &DocumentId, write: DocumentWrite) -> Result<()> {
        let incoming = write.resolve(Timestamp::now())?;
        {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            let mut current = read_data(&tx, collection, id)?
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            current.extend(incoming);
            let json = serde_json::to_string(&current)?;
            let _ = tx.execute(
                "UPDATE documents
                 SET data = ?3, written_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE collection = ?1 AND id = ?2",
                params![collection, id.as_str(), json],
            )?;
            tx.commit()?;
        }
        self.announce(collection, id, ChangeKind::Modified);
        Ok(())
    }

    /// Delete a document. Returns `false` if it did not exist.
    #[instrument(skip(self))]
    pub fn delete(&self, collection: &str, id: &DocumentId) -> Result<bool> {
        let removed = {
            let conn = self.conn()?;
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id.as_str()],
            )?
        };
        if removed > 0 {
            self.announce(collection, id, ChangeKind::Removed);
        }
        Ok(removed > 0)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Read one document.
    pub fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        let conn = self.conn()?;
        Ok(read_data(&conn, collection, id)?.map(|data| Document {
            id: id.clone(),
            data,
        }))
    }

    /// Run a query.
    pub fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let (sql, values) = build_select(query)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, json) = row?;
            documents.push(Document {
                data: parse_object(&id, &json)?,
                id: DocumentId::from(id),
            });
        }
        debug!(
            collection = %query.collection,
            count = documents.len(),
            "query executed"
        );
        Ok(documents)
    }
}

fn read_data(
    conn: &rusqlite::Connection,
    collection: &str,
    id: &DocumentId,
) -> Result<Option<Map<String, Value>>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    json.map(|j| parse_object(id, &j)).transpose()
}

fn parse_object(id: &str, json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(json)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidDocument {
            id: id.to_string(),
            message: "stored data is not an object".to_string(),
        }),
    }
}

/// Translate a [`Query`] into SQL plus bound values.
fn build_select(query: &Query) -> Result<(String, Vec<rusqlite::types::Value>)> {
    use rusqlite::types::Value as Sql;

    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
    let mut values = vec![Sql::Text(query.collection.clone())];

    for filter in &query.filters {
        let path = json_path(&filter.field)?;
        match &filter.value {
            Value::Null => {
                sql.push_str(&format!(" AND json_extract(data, '{path}') IS NULL"));
            }
            Value::Bool(b) => {
                sql.push_str(&format!(" AND json_extract(data, '{path}') = ?"));
                values.push(Sql::Integer(i64::from(*b)));
            }
            Value::Number(n) => {
                sql.push_str(&format!(" AND json_extract(data, '{path}') = ?"));
                values.push(match n.as_i64() {
                    Some(i) => Sql::Integer(i),
                    None => Sql::Real(n.as_f64().unwrap_or(f64::NAN)),
                });
            }
            Value::String(s) => {
                sql.push_str(&format!(" AND json_extract(data, '{path}') = ?"));
                values.push(Sql::Text(s.clone()));
            }
            Value::Array(_) | Value::Object(_) => {
                return Err(StoreError::InvalidQuery(format!(
                    "equality filter on {} must be a scalar",
                    filter.field
                )));
            }
        }
    }

    if let Some(order) = &query.order_by {
        let path = json_path(&order.field)?;
        let dir = match order.direction {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        };
        // timestamp objects order by seconds/nanoseconds, scalars by value;
        // missing fields go last in either direction
        sql.push_str(&format!(
            " ORDER BY (json_type(data, '{path}') IS NULL) ASC, \
             COALESCE(json_extract(data, '{path}.seconds'), json_extract(data, '{path}')) {dir}, \
             json_extract(data, '{path}.nanoseconds') {dir}, id ASC"
        ));
    } else {
        sql.push_str(" ORDER BY id ASC");
    }

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        values.push(Sql::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
    }

    Ok((sql, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn store() -> DocumentStore {
        DocumentStore::open_in_memory().unwrap()
    }

    #[test]
    fn add_then_get() {
        let store = store();
        let id = store
            .add(
                "tasks",
                DocumentWrite::new()
                    .set("title", "write docs")
                    .server_timestamp("createdAt"),
            )
            .unwrap();

        let doc = store.get("tasks", &id).unwrap().unwrap();
        assert_eq!(doc.get("title"), Some(&json!("write docs")));
        assert!(doc.data["createdAt"]["seconds"].as_i64().unwrap() > 0);
    }

    #[test]
    fn get_missing_is_none() {
        assert!(store().get("tasks", &DocumentId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn update_merges_fields() {
        let store = store();
        let id = store
            .add("tasks", DocumentWrite::new().set("title", "a").set("status", "todo"))
            .unwrap();
        store
            .update("tasks", &id, DocumentWrite::new().set("status", "done"))
            .unwrap();

        let doc = store.get("tasks", &id).unwrap().unwrap();
        assert_eq!(doc.data["title"], "a");
        assert_eq!(doc.data["status"], "done");
    }

    #[test]
    fn update_missing_fails() {
        let err = store()
            .update("tasks", &DocumentId::from("ghost"), DocumentWrite::new().set("x", 1))
            .unwrap_err();
        assert_matches!(err, StoreError::NotFound { .. });
    }

    #[test]
    fn set_merge_creates_then_merges() {
        let store = store();
        let id = DocumentId::from("uid-1");
        store
            .set("users", &id, DocumentWrite::new().set("email", "a@b.c"), SetMode::Merge)
            .unwrap();
        store
            .set("users", &id, DocumentWrite::new().set("name", "Ada"), SetMode::Merge)
            .unwrap();
        let doc = store.get("users", &id).unwrap().unwrap();
        assert_eq!(doc.data["email"], "a@b.c");
        assert_eq!(doc.data["name"], "Ada");

        store
            .set("users", &id, DocumentWrite::new().set("name", "Bo"), SetMode::Overwrite)
            .unwrap();
        let doc = store.get("users", &id).unwrap().unwrap();
        assert!(doc.get("email").is_none());
    }

    #[test]
    fn create_never_touches_an_existing_document() {
        let store = store();
        let id = DocumentId::from("uid-1");
        let mut rx = store.changes();
        assert!(store.create("users", &id, DocumentWrite::new().set("count", 0)).unwrap());
        store.update("users", &id, DocumentWrite::new().set("count", 3)).unwrap();

        assert!(!store.create("users", &id, DocumentWrite::new().set("count", 0)).unwrap());
        assert_eq!(store.get("users", &id).unwrap().unwrap().data["count"], 3);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|c| c.kind).collect();
        assert_eq!(kinds, [ChangeKind::Added, ChangeKind::Modified]);
    }

    #[test]
    fn delete_is_hard_delete() {
        let store = store();
        let id = store.add("tasks", DocumentWrite::new().set("title", "x")).unwrap();
        assert!(store.delete("tasks", &id).unwrap());
        assert!(!store.delete("tasks", &id).unwrap());
        assert!(store.get("tasks", &id).unwrap().is_none());
    }

    #[test]
    fn query_filters_by_equality() {
        let store = store();
        let _ = store.add("tasks", DocumentWrite::new().set("owner", "u1").set("n", 1)).unwrap();
        let _ = store.add("tasks", DocumentWrite::new().set("owner", "u2").set("n", 2)).unwrap();
        let _ = store.add("other", DocumentWrite::new().set("owner", "u1")).unwrap();

        let docs = store
            .query(&Query::collection("tasks").where_eq("owner", "u1"))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["n"], 1);

        let docs = store
            .query(&Query::collection("tasks").where_eq("n", 2))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["owner"], "u2");
    }

    #[test]
    fn query_filters_on_bool_and_null() {
        let store = store();
        let _ = store.add("t", DocumentWrite::new().set("done", true)).unwrap();
        let _ = store.add("t", DocumentWrite::new().set("done", false)).unwrap();
        let _ = store.add("t", DocumentWrite::new().set("other", 1)).unwrap();

        assert_eq!(store.query(&Query::collection("t").where_eq("done", true)).unwrap().len(), 1);
        assert_eq!(
            store.query(&Query::collection("t").where_eq("done", Value::Null)).unwrap().len(),
            1
        );
    }

    #[test]
    fn query_orders_timestamps_and_numbers_descending() {
        let store = store();
        for (name, created) in [
            ("a", json!({"seconds": 100, "nanoseconds": 0})),
            ("b", json!({"seconds": 300, "nanoseconds": 0})),
            ("c", json!(200)),
        ] {
            let _ = store
                .add("tasks", DocumentWrite::new().set("name", name).set("createdAt", created))
                .unwrap();
        }
        let _ = store.add("tasks", DocumentWrite::new().set("name", "none")).unwrap();

        let docs = store
            .query(&Query::collection("tasks").order_by("createdAt", Direction::Descending))
            .unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.data["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["b", "c", "a", "none"]);
    }

    #[test]
    fn query_limit() {
        let store = store();
        for i in 0..5 {
            let _ = store.add("t", DocumentWrite::new().set("i", i)).unwrap();
        }
        assert_eq!(store.query(&Query::collection("t").limit(2)).unwrap().len(), 2);
    }

    #[test]
    fn query_rejects_object_filter() {
        let err = store()
            .query(&Query::collection("t").where_eq("x", json!({"a": 1})))
            .unwrap_err();
        assert_matches!(err, StoreError::InvalidQuery(_));
    }

    #[test]
    fn writes_are_announced() {
        let store = store();
        let mut rx = store.changes();
        let id = store.add("tasks", DocumentWrite::new().set("a", 1)).unwrap();
        store.update("tasks", &id, DocumentWrite::new().set("a", 2)).unwrap();
        let _ = store.delete("tasks", &id).unwrap();

        let kinds: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(kinds, [ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed]);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let id = {
            let store = DocumentStore::open(&path, &ConnectionConfig::default(), 16).unwrap();
            store.add("tasks", DocumentWrite::new().set("title", "keep")).unwrap()
        };
        let store = DocumentStore::open(&path, &ConnectionConfig::default(), 16).unwrap();
        let doc = store.get("tasks", &id).unwrap().unwrap();
        assert_eq!(doc.data["title"], "keep");
    }
}
