//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TaskdeckSettings::default()`]
//! 2. If `~/.taskdeck/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TASKDECK_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::TaskdeckSettings;

/// Resolve the taskdeck data directory (`~/.taskdeck`).
pub fn data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".taskdeck")
}

/// Resolve the path to the settings file (`~/.taskdeck/settings.json`).
pub fn settings_path() -> PathBuf {
    data_dir().join("settings.json")
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TaskdeckSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TaskdeckSettings> {
    let defaults = serde_json::to_value(TaskdeckSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: TaskdeckSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings that cannot produce a working store or auth service.
pub fn validate(settings: &TaskdeckSettings) -> Result<()> {
    if settings.store.pool_size == 0 {
        return Err(SettingsError::InvalidValue(
            "store.poolSize must be at least 1".to_string(),
        ));
    }
    if settings.store.change_buffer == 0 {
        return Err(SettingsError::InvalidValue(
            "store.changeBuffer must be at least 1".to_string(),
        ));
    }
    if settings.auth.min_password_length == 0 {
        return Err(SettingsError::InvalidValue(
            "auth.minPasswordLength must be at least 1".to_string(),
        ));
    }
    if !(4..=31).contains(&settings.auth.password_hash_cost) {
        return Err(SettingsError::InvalidValue(format!(
            "auth.passwordHashCost must be between 4 and 31 (got {})",
            settings.auth.password_hash_cost
        )));
    }
    if !matches!(
        settings.client.default_theme.as_str(),
        "light" | "dark" | "system"
    ) {
        return Err(SettingsError::InvalidValue(format!(
            "client.defaultTheme must be light, dark or system (got {})",
            settings.client.default_theme
        )));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (file/default value wins).
pub fn apply_env_overrides(settings: &mut TaskdeckSettings) {
    if let Some(v) = read_env_string("TASKDECK_DB_PATH") {
        settings.store.db_path = v;
    }
    if let Some(v) = read_env_u32("TASKDECK_POOL_SIZE", 1, 64) {
        settings.store.pool_size = v;
    }
    if let Some(v) = read_env_string("TASKDECK_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("TASKDECK_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = read_env_string("TASKDECK_CLIENT_STORAGE") {
        settings.client.storage_path = v;
    }
    if let Some(v) = read_env_usize("TASKDECK_MIN_PASSWORD_LEN", 1, 128) {
        settings.auth.min_password_length = v;
    }
    if let Some(v) = read_env_bool("TASKDECK_MOCK_MODE") {
        settings.auth.mock_mode = v;
    }
    if let Some(v) = read_env_u32("TASKDECK_PASSWORD_HASH_COST", 4, 31) {
        settings.auth.password_hash_cost = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u32(name: &str, min: u32, max: u32) -> Option<u32> {
    let val = std::env::var(name).ok()?;
    let result = parse_u32_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u32 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
