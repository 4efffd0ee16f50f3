//! Auth service.
//!
//! Accounts live in the `credentials` collection, one document per sign-in
//! method (`password:<email>` or `<provider>:<provider uid>`), each pointing
//! at the account's user id. The current session is published on a watch
//! channel so user contexts can follow sign-in and sign-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use taskdeck_core::{DocumentId, UserId};
use taskdeck_settings::AuthSettings;
use taskdeck_store::{DocumentStore, DocumentWrite, Query, SetMode};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{AuthError, AuthErrorCode, Result};
use crate::password::{generate_token, hash_password, verify_password};
use crate::popup::PopupFlow;
use crate::types::{AuthUser, PopupIdentity, Provider, Session, SignInOutcome};

/// Credential collection.
pub const CREDENTIALS_COLLECTION: &str = "credentials";
/// Password reset request collection.
pub const PASSWORD_RESETS_COLLECTION: &str = "password_resets";

/// Consecutive wrong passwords before an email is throttled.
const MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    uid: UserId,
    #[serde(default)]
    email: Option<String>,
    provider: Provider,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    hash: Option<String>,
}

impl Credential {
    fn into_user(self) -> AuthUser {
        AuthUser {
            uid: self.uid,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            provider: self.provider,
        }
    }
}

/// Wrong-password streak for one email.
#[derive(Clone, Copy, Debug)]
struct Throttle {
    failures: u32,
    last_failure: Instant,
}

struct Inner {
    store: DocumentStore,
    settings: AuthSettings,
    session: watch::Sender<Option<Session>>,
    failures: Mutex<HashMap<String, Throttle>>,
}

/// Authentication over the document store. Cheap to clone; clones share the
/// session.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("signed_in", &self.inner.session.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Create a signed-out service.
    pub fn new(store: DocumentStore, settings: AuthSettings) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                session,
                failures: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register an email/password account and sign it in.
    #[instrument(skip(self, password, display_name))]
    pub fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < self.inner.settings.min_password_length {
            return Err(AuthErrorCode::WeakPassword.into());
        }
        if !self.credentials_for_email(&email)?.is_empty() {
            return Err(AuthErrorCode::EmailAlreadyInUse.into());
        }

        let user = AuthUser {
            uid: UserId::generate(),
            email: Some(email.clone()),
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            photo_url: None,
            provider: Provider::Password,
        };
        let hash = hash_password(password, self.inner.settings.password_hash_cost)?;
        let write = credential_write(&user).set("hash", hash);
        self.inner.store.set(
            CREDENTIALS_COLLECTION,
            &password_key(&email),
            write,
            SetMode::Overwrite,
        )?;

        info!(uid = %user.uid, "account created");
        Ok(self.start_session(user))
    }

    /// Sign in with email and password.
    ///
    /// After [`MAX_FAILED_ATTEMPTS`] wrong passwords the email is refused with
    /// `auth/too-many-requests` until `lockout_seconds` pass without another
    /// failure.
    #[instrument(skip(self, password))]
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        if self.is_throttled(&email) {
            warn!("sign-in throttled");
            return Err(AuthErrorCode::TooManyRequests.into());
        }

        let Some(doc) = self
            .inner
            .store
            .get(CREDENTIALS_COLLECTION, &password_key(&email))?
        else {
            return Err(AuthErrorCode::UserNotFound.into());
        };
        let credential: Credential = doc.decode()?;
        let Some(hash) = &credential.hash else {
            return Err(AuthErrorCode::InvalidCredential.into());
        };

        if !verify_password(password, hash)? {
            let attempts = self.record_failure(&email);
            debug!(attempts, "wrong password");
            return Err(AuthErrorCode::WrongPassword.into());
        }

        let _ = self.inner.failures.lock().remove(&email);
        Ok(self.start_session(credential.into_user()))
    }

    /// Sign in through a provider popup.
    ///
    /// Closing or superseding the popup yields [`SignInOutcome::Cancelled`];
    /// every other failure is [`SignInOutcome::Failed`] with a display message.
    #[instrument(skip(self, popup))]
    pub fn sign_in_with_provider(&self, provider: Provider, popup: &dyn PopupFlow) -> SignInOutcome {
        if !provider.is_oauth() || !self.inner.settings.provider_enabled(provider.as_str()) {
            return SignInOutcome::Failed(AuthErrorCode::OperationNotAllowed.message().to_string());
        }

        let identity = match popup.authorize(provider) {
            Ok(identity) => identity,
            Err(code) if code.is_cancellation() => {
                info!(code = code.as_str(), "popup sign-in cancelled");
                return SignInOutcome::Cancelled;
            }
            Err(code) => {
                warn!(code = code.as_str(), "popup sign-in failed");
                return SignInOutcome::Failed(code.message().to_string());
            }
        };

        match self.link_identity(provider, identity) {
            Ok(user) => SignInOutcome::SignedIn(self.start_session(user)),
            Err(e) => {
                if e.code().is_none() {
                    error!(error = %e, "popup sign-in failed");
                }
                SignInOutcome::Failed(e.user_message().to_string())
            }
        }
    }

    /// End the current session. No-op when signed out.
    pub fn sign_out(&self) {
        let previous = self.inner.session.send_replace(None);
        if let Some(session) = previous {
            info!(uid = %session.user.uid, "signed out");
        }
    }

    /// Reinstate a previously persisted session.
    pub fn restore_session(&self, session: Session) {
        info!(uid = %session.user.uid, "session restored");
        let _ = self.inner.session.send_replace(Some(session));
    }

    /// The active session.
    pub fn current_session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    /// The signed-in user.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.session.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Receiver that sees every session change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    /// Record a password reset request for `email`. Delivery happens elsewhere.
    #[instrument(skip(self))]
    pub fn send_password_reset(&self, email: &str) -> Result<()> {
        let email = normalize_email(email)?;
        if self
            .inner
            .store
            .get(CREDENTIALS_COLLECTION, &password_key(&email))?
            .is_none()
        {
            return Err(AuthErrorCode::UserNotFound.into());
        }
        let _ = self.inner.store.add(
            PASSWORD_RESETS_COLLECTION,
            DocumentWrite::new()
                .set("email", email.as_str())
                .set("token", generate_token())
                .server_timestamp("requestedAt"),
        )?;
        info!("password reset requested");
        Ok(())
    }

    fn start_session(&self, user: AuthUser) -> Session {
        let session = Session::start(user);
        info!(uid = %session.user.uid, provider = session.user.provider.as_str(), "signed in");
        let _ = self.inner.session.send_replace(Some(session.clone()));
        session
    }

    fn link_identity(&self, provider: Provider, identity: PopupIdentity) -> Result<AuthUser> {
        if identity.provider_uid.is_empty() {
            return Err(AuthErrorCode::InvalidCredential.into());
        }
        let key = DocumentId::from(format!("{}:{}", provider.as_str(), identity.provider_uid));
        if let Some(doc) = self.inner.store.get(CREDENTIALS_COLLECTION, &key)? {
            return Ok(doc.decode::<Credential>()?.into_user());
        }

        let email = identity
            .email
            .as_deref()
            .map(normalize_email)
            .transpose()?;
        if let Some(email) = &email {
            if !self.credentials_for_email(email)?.is_empty() {
                return Err(AuthErrorCode::AccountExistsWithDifferentCredential.into());
            }
        }

        let user = AuthUser {
            uid: UserId::generate(),
            email,
            display_name: identity.display_name,
            photo_url: identity.photo_url,
            provider,
        };
        self.inner.store.set(
            CREDENTIALS_COLLECTION,
            &key,
            credential_write(&user),
            SetMode::Overwrite,
        )?;
        info!(uid = %user.uid, provider = provider.as_str(), "account linked");
        Ok(user)
    }

    fn credentials_for_email(&self, email: &str) -> Result<Vec<Credential>> {
        self.inner
            .store
            .query(&Query::collection(CREDENTIALS_COLLECTION).where_eq("email", email))?
            .iter()
            .map(|doc| doc.decode::<Credential>().map_err(AuthError::from))
            .collect()
    }

    fn is_throttled(&self, email: &str) -> bool {
        let window = Duration::from_secs(self.inner.settings.lockout_seconds);
        let mut failures = self.inner.failures.lock();
        match failures.get(email).copied() {
            Some(t) if t.failures >= MAX_FAILED_ATTEMPTS => {
                if t.last_failure.elapsed() < window {
                    return true;
                }
                let _ = failures.remove(email);
                false
            }
            _ => false,
        }
    }

    fn record_failure(&self, email: &str) -> u32 {
        let now = Instant::now();
        let mut failures = self.inner.failures.lock();
        let throttle = failures.entry(email.to_string()).or_insert(Throttle {
            failures: 0,
            last_failure: now,
        });
        throttle.failures += 1;
        throttle.last_failure = now;
        throttle.failures
    }
}

fn password_key(email: &str) -> DocumentId {
    DocumentId::from(format!("password:{email}"))
}

fn credential_write(user: &AuthUser) -> DocumentWrite {
    let mut write = DocumentWrite::new()
        .set("uid", user.uid.as_str())
        .set("provider", user.provider.as_str())
        .server_timestamp("createdAt");
    if let Some(email) = &user.email {
        write = write.set("email", email.as_str());
    }
    if let Some(name) = &user.display_name {
        write = write.set("displayName", name.as_str());
    }
    if let Some(url) = &user.photo_url {
        write = write.set("photoUrl", url.as_str());
    }
    write
}

/// Trim and lowercase an email, rejecting anything that is not
/// `local@domain.tld`.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
    });
    if valid {
        Ok(email)
    } else {
        Err(AuthErrorCode::InvalidEmail.into())
    }
}
