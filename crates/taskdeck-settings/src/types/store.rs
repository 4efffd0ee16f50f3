//! Document store settings.

use serde::{Deserialize, Serialize};

/// Where the document store lives and how its connection pool is sized.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// `SQLite` database path. `~` expands to `$HOME`; `:memory:` keeps
    /// everything in process.
    pub db_path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Capacity of the change-notification channel feeding live queries.
    pub change_buffer: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: "~/.taskdeck/documents.db".to_string(),
            pool_size: 8,
            busy_timeout_ms: 30_000,
            change_buffer: 256,
        }
    }
}

impl StoreSettings {
    /// Whether the store should be opened in memory.
    pub fn is_in_memory(&self) -> bool {
        self.db_path == ":memory:"
    }
}
