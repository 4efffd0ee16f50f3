//! Documents, writes, and queries.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use taskdeck_core::{DocumentId, Timestamp};

use crate::errors::{Result, StoreError};

/// A stored document: its id plus a JSON object of fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Store-assigned id.
    pub id: DocumentId,
    /// Field values.
    pub data: Map<String, Value>,
}

impl Document {
    /// Field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Deserialize the document into `T`, exposing the id as an `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        let _ = data.insert("id".to_string(), Value::String(self.id.to_string()));
        Ok(serde_json::from_value(Value::Object(data))?)
    }
}

/// A set of field writes, some of which may be server timestamps.
///
/// Server timestamp fields are resolved to the commit time by the store, so
/// the writer never sees their final value until it reads the document back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentWrite {
    fields: Map<String, Value>,
    server_timestamps: Vec<String>,
}

impl DocumentWrite {
    /// An empty write.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing field map.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Serialize `value` and take its top-level object fields.
    pub fn from_serialize<T: serde::Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self::from_map(fields)),
            other => Err(StoreError::InvalidDocument {
                id: String::new(),
                message: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    /// Set a field.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        self.server_timestamps.retain(|f| *f != field);
        let _ = self.fields.insert(field, value.into());
        self
    }

    /// Mark a field to be stamped with the commit time.
    #[must_use]
    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        let _ = self.fields.remove(&field);
        if !self.server_timestamps.contains(&field) {
            self.server_timestamps.push(field);
        }
        self
    }

    /// Plain (non-timestamp) fields of this write.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Fields that will be stamped at commit.
    pub fn server_timestamp_fields(&self) -> &[String] {
        &self.server_timestamps
    }

    /// Whether the write touches no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.server_timestamps.is_empty()
    }

    /// Resolve server timestamps against `now` and return the final fields.
    pub(crate) fn resolve(self, now: Timestamp) -> Result<Map<String, Value>> {
        let mut fields = self.fields;
        let stamp = serde_json::to_value(now)?;
        for field in self.server_timestamps {
            let _ = fields.insert(field, stamp.clone());
        }
        Ok(fields)
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// An equality filter on a single field.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    /// Top-level or dotted field path.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

/// An ordering clause.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderBy {
    /// Field to order on. Timestamp objects order by `seconds` then `nanoseconds`.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

/// A collection query: equality filters, an optional ordering, an optional limit.
///
/// Documents missing the ordered field are kept and sort after the rest.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: String,
    /// Conjunction of equality filters.
    pub filters: Vec<Filter>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Optional maximum result count.
    pub limit: Option<usize>,
}

impl Query {
    /// Every document in `collection`.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Set the ordering.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Validate a field path and turn it into a `json_extract` path.
pub(crate) fn json_path(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(format!("$.{field}"))
    } else {
        Err(StoreError::InvalidQuery(format!("bad field path: {field:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn set_then_server_timestamp_replaces_value() {
        let write = DocumentWrite::new()
            .set("createdAt", 5)
            .server_timestamp("createdAt");
        assert!(write.fields().get("createdAt").is_none());
        assert_eq!(write.server_timestamp_fields(), ["createdAt".to_string()]);
    }

    #[test]
    fn server_timestamp_then_set_cancels_stamp() {
        let write = DocumentWrite::new()
            .server_timestamp("updatedAt")
            .set("updatedAt", 7);
        assert!(write.server_timestamp_fields().is_empty());
        assert_eq!(write.fields()["updatedAt"], 7);
    }

    #[test]
    fn resolve_stamps_fields() {
        let now = Timestamp {
            seconds: 42,
            nanoseconds: 0,
        };
        let fields = DocumentWrite::new()
            .set("title", "t")
            .server_timestamp("createdAt")
            .resolve(now)
            .unwrap();
        assert_eq!(fields["createdAt"]["seconds"], 42);
        assert_eq!(fields["title"], "t");
    }

    #[test]
    fn from_serialize_rejects_non_objects() {
        assert!(DocumentWrite::from_serialize(&3).is_err());
        assert!(DocumentWrite::from_serialize(&serde_json::json!({"a": 1})).is_ok());
    }

    #[test]
    fn decode_injects_id() {
        #[derive(Deserialize)]
        struct Row {
            id: String,
            title: String,
        }
        let mut data = Map::new();
        let _ = data.insert("title".to_string(), Value::from("hello"));
        let doc = Document {
            id: DocumentId::from("d1"),
            data,
        };
        let row: Row = doc.decode().unwrap();
        assert_eq!(row.id, "d1");
        assert_eq!(row.title, "hello");
    }

    #[test]
    fn json_path_validation() {
        assert_eq!(json_path("owner").unwrap(), "$.owner");
        assert_eq!(json_path("createdAt.seconds").unwrap(), "$.createdAt.seconds");
        assert!(json_path("").is_err());
        assert!(json_path("a..b").is_err());
        assert!(json_path("x'); DROP TABLE documents; --").is_err());
    }

    #[test]
    fn query_builder() {
        let q = Query::collection("tasks")
            .where_eq("owner", "u1")
            .order_by("createdAt", Direction::Descending)
            .limit(10);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.limit, Some(10));
        assert_eq!(q.order_by.unwrap().direction, Direction::Descending);
    }
}
