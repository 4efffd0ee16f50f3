//! # taskdeck-store
//!
//! An embedded document store standing in for a hosted document database.
//!
//! - **Collections of JSON documents** keyed by generated or caller-chosen ids
//! - **Server timestamps**: fields stamped at commit time via [`DocumentWrite::server_timestamp`]
//! - **Queries**: equality filters, one ordering, a limit
//! - **Live queries**: [`DocumentStore::listen`] re-delivers a query's result
//!   after every committed write to its collection
//!
//! Backed by `SQLite` through an `r2d2` pool; documents are stored as JSON text
//! and filtered with `json_extract`.

#![deny(unsafe_code)]

pub mod connection;
pub mod document;
pub mod errors;
pub mod listener;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool};
pub use document::{Direction, Document, DocumentWrite, Filter, OrderBy, Query};
pub use errors::{Result, StoreError};
pub use listener::{ListenerRegistration, SnapshotCallback};
pub use store::{ChangeKind, DocumentChange, DocumentStore, SetMode};
