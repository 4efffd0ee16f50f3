//! OAuth popup seam.
//!
//! The popup itself lives in the host (a browser window, a device flow); the
//! auth service only needs the identity it yields or the code it failed with.

use crate::errors::AuthErrorCode;
use crate::types::{PopupIdentity, Provider};

/// Runs a provider sign-in popup.
#[cfg_attr(test, mockall::automock)]
pub trait PopupFlow: Send + Sync {
    /// Show the popup for `provider` and wait for it to finish.
    fn authorize(&self, provider: Provider) -> Result<PopupIdentity, AuthErrorCode>;
}

/// Popup used in mock mode: completes instantly with a fixed demo identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct DemoPopup;

impl PopupFlow for DemoPopup {
    fn authorize(&self, provider: Provider) -> Result<PopupIdentity, AuthErrorCode> {
        Ok(PopupIdentity {
            provider_uid: format!("demo-{}", provider.as_str()),
            email: Some("demo@taskdeck.local".to_string()),
            display_name: Some("Demo User".to_string()),
            photo_url: None,
        })
    }
}
