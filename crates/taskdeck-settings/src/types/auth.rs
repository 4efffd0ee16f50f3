//! Authentication settings.

use serde::{Deserialize, Serialize};

/// Sign-in rules and identity providers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// Minimum accepted password length for email/password sign-up.
    pub min_password_length: usize,
    /// Enabled third-party identity providers (`google`, `github`).
    pub providers: Vec<String>,
    /// Start in mock mode: a persisted demo session instead of real sign-in.
    pub mock_mode: bool,
    /// bcrypt work factor for stored passwords (4..=31).
    pub password_hash_cost: u32,
    /// How long an email stays throttled after too many wrong passwords.
    pub lockout_seconds: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            min_password_length: 6,
            providers: vec!["google".to_string(), "github".to_string()],
            mock_mode: false,
            password_hash_cost: 12,
            lockout_seconds: 300,
        }
    }
}

impl AuthSettings {
    /// Whether the named provider is enabled.
    pub fn provider_enabled(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.eq_ignore_ascii_case(name))
    }
}
