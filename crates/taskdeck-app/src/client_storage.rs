//! Per-device key-value storage.
//!
//! A flat JSON object on disk, rewritten on every change with owner-only
//! permissions (0o600). A missing or unreadable file starts empty.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use taskdeck_auth::Session;
use tracing::{debug, warn};

use crate::errors::ClientStorageError;

/// Storage keys.
pub mod keys {
    /// Selected theme.
    pub const THEME: &str = "taskdeck.theme";
    /// Sidebar collapsed flag.
    pub const SIDEBAR_COLLAPSED: &str = "taskdeck.sidebarCollapsed";
    /// Saved list views.
    pub const SAVED_VIEWS: &str = "taskdeck.savedViews";
    /// Persisted demo session (mock mode only).
    pub const MOCK_SESSION: &str = "taskdeck.mockSession";
}

/// Color theme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light.
    Light,
    /// Dark.
    Dark,
    /// Follow the OS.
    #[default]
    System,
}

impl Theme {
    /// Parse `light`, `dark` or `system`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A named list filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    /// Unique name.
    pub name: String,
    /// Status filter (`all` or a status).
    pub status: String,
    /// Search text.
    #[serde(default)]
    pub search: String,
}

/// JSON key-value file.
#[derive(Debug)]
pub struct ClientStorage {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl ClientStorage {
    /// Open the file at `path`, starting empty if it is missing or corrupt.
    pub fn open(path: &Path) -> Self {
        let values = match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<Map<String, Value>>(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring unparseable client storage");
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read client storage");
                Map::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            values: Mutex::new(values),
        }
    }

    /// Storage that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(Map::new()),
        }
    }

    /// Read and decode a key. Undecodable values read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.values.lock().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed client storage value");
                None
            }
        }
    }

    /// Store a value and persist. On a failed write nothing changes.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ClientStorageError> {
        let value = serde_json::to_value(value)?;
        let mut values = self.values.lock();
        let mut next = values.clone();
        let _ = next.insert(key.to_string(), value);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    /// Remove a key and persist. Returns whether it was present. On a failed
    /// write nothing changes.
    pub fn remove(&self, key: &str) -> Result<bool, ClientStorageError> {
        let mut values = self.values.lock();
        if !values.contains_key(key) {
            return Ok(false);
        }
        let mut next = values.clone();
        let _ = next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Typed accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Stored theme.
    pub fn theme(&self) -> Option<Theme> {
        self.get(keys::THEME)
    }

    /// Store the theme.
    pub fn set_theme(&self, theme: Theme) -> Result<(), ClientStorageError> {
        self.set(keys::THEME, &theme)
    }

    /// Whether the sidebar is collapsed (default expanded).
    pub fn sidebar_collapsed(&self) -> bool {
        self.get(keys::SIDEBAR_COLLAPSED).unwrap_or(false)
    }

    /// Store the sidebar flag.
    pub fn set_sidebar_collapsed(&self, collapsed: bool) -> Result<(), ClientStorageError> {
        self.set(keys::SIDEBAR_COLLAPSED, &collapsed)
    }

    /// Saved views in insertion order.
    pub fn saved_views(&self) -> Vec<SavedView> {
        self.get(keys::SAVED_VIEWS).unwrap_or_default()
    }

    /// Add or replace a saved view by name.
    pub fn save_view(&self, view: SavedView) -> Result<(), ClientStorageError> {
        let mut views = self.saved_views();
        match views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => *existing = view,
            None => views.push(view),
        }
        self.set(keys::SAVED_VIEWS, &views)
    }

    /// Delete a saved view. Returns whether it existed.
    pub fn delete_view(&self, name: &str) -> Result<bool, ClientStorageError> {
        let mut views = self.saved_views();
        let before = views.len();
        views.retain(|v| v.name != name);
        if views.len() == before {
            return Ok(false);
        }
        self.set(keys::SAVED_VIEWS, &views)?;
        Ok(true)
    }

    /// The persisted demo session.
    pub fn mock_session(&self) -> Option<Session> {
        self.get(keys::MOCK_SESSION)
    }

    /// Persist or clear the demo session.
    pub fn set_mock_session(&self, session: Option<&Session>) -> Result<(), ClientStorageError> {
        match session {
            Some(s) => self.set(keys::MOCK_SESSION, s),
            None => self.remove(keys::MOCK_SESSION).map(|_| ()),
        }
    }

    fn persist(&self, values: &Map<String, Value>) -> Result<(), ClientStorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(values)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }
        debug!(path = %path.display(), keys = values.len(), "client storage saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use taskdeck_auth::{AuthUser, Provider};
    use taskdeck_core::UserId;
    use taskdeck_core::logging::capture_logs;
    use tempfile::TempDir;

    use super::*;

    fn view(name: &str, status: &str) -> SavedView {
        SavedView {
            name: name.to_string(),
            status: status.to_string(),
            search: String::new(),
        }
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client.json");

        let storage = ClientStorage::open(&path);
        storage.set_theme(Theme::Dark).unwrap();
        storage.set_sidebar_collapsed(true).unwrap();

        let reopened = ClientStorage::open(&path);
        assert_eq!(reopened.theme(), Some(Theme::Dark));
        assert!(reopened.sidebar_collapsed());

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["taskdeck.theme"], "dark");
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        ClientStorage::open(&path).set_theme(Theme::Light).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, "{not json").unwrap();
        let (logs, _guard) = capture_logs();
        let storage = ClientStorage::open(&path);
        assert!(logs.has_message("ignoring unparseable client storage"));
        assert!(storage.theme().is_none());
        assert!(!storage.sidebar_collapsed());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be makes every write fail
        let path = dir.path().join("client.json");
        std::fs::create_dir(&path).unwrap();

        let storage = ClientStorage::open(&path);
        assert!(storage.set_theme(Theme::Dark).is_err());
        assert!(storage.theme().is_none());
    }

    #[test]
    fn malformed_value_reads_as_absent() {
        let storage = ClientStorage::in_memory();
        storage.set(keys::THEME, &"purple").unwrap();
        assert!(storage.theme().is_none());
    }

    #[test]
    fn saved_views_upsert_and_delete() {
        let storage = ClientStorage::in_memory();
        storage.save_view(view("mine", "todo")).unwrap();
        storage.save_view(view("done", "done")).unwrap();
        storage.save_view(view("mine", "in_progress")).unwrap();

        let views = storage.saved_views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0], view("mine", "in_progress"));

        assert!(storage.delete_view("done").unwrap());
        assert!(!storage.delete_view("done").unwrap());
        assert_eq!(storage.saved_views().len(), 1);
    }

    #[test]
    fn mock_session_round_trip() {
        let storage = ClientStorage::in_memory();
        let session = Session::start(AuthUser {
            uid: UserId::from("demo"),
            email: None,
            display_name: Some("Demo".to_string()),
            photo_url: None,
            provider: Provider::Google,
        });
        storage.set_mock_session(Some(&session)).unwrap();
        assert_eq!(storage.mock_session(), Some(session));
        storage.set_mock_session(None).unwrap();
        assert!(storage.mock_session().is_none());
    }

    #[test]
    fn theme_parse() {
        assert_eq!(Theme::parse("dark"), Some(Theme::Dark));
        assert_eq!(Theme::parse("neon"), None);
    }
}
