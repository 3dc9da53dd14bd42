//! Email and password sign-in.

use std::fmt;
use std::sync::Arc;

use entities::UserRecord;
use serde::{Deserialize, Serialize};
use user_store::UserStore;

use crate::{AuthError, AuthResult, PasswordHasher};

/// User-supplied email/password pair for one sign-in attempt.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Plaintext password.
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Creates a new credentials pair.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The minimal identity produced by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// User ID.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Premium flag.
    pub is_premium: bool,
}

impl From<&UserRecord> for Identity {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            is_premium: user.is_premium,
        }
    }
}

/// Credential store slot, resolved once at startup.
#[derive(Clone)]
pub enum CredentialBackend {
    /// A user store is configured.
    Available(Arc<dyn UserStore>),
    /// No user store; password sign-in always fails with `ServiceUnavailable`.
    Absent,
}

impl CredentialBackend {
    /// Returns the store, if one is configured.
    pub fn store(&self) -> Option<&Arc<dyn UserStore>> {
        match self {
            CredentialBackend::Available(store) => Some(store),
            CredentialBackend::Absent => None,
        }
    }

    /// Returns true if a store is configured.
    pub fn is_available(&self) -> bool {
        matches!(self, CredentialBackend::Available(_))
    }
}

impl fmt::Debug for CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialBackend::Available(_) => f.write_str("Available"),
            CredentialBackend::Absent => f.write_str("Absent"),
        }
    }
}

/// Verifies email/password pairs against the credential store.
#[derive(Clone)]
pub struct CredentialsProvider {
    backend: CredentialBackend,
    hasher: Arc<dyn PasswordHasher>,
}

impl fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsProvider")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl CredentialsProvider {
    /// Provider identifier used in routes and provider listings.
    pub const ID: &'static str = "credentials";

    /// Creates a new credentials provider.
    pub fn new(backend: CredentialBackend, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { backend, hasher }
    }

    /// Returns the configured backend slot.
    pub fn backend(&self) -> &CredentialBackend {
        &self.backend
    }

    /// Checks a credentials pair and returns the matching identity.
    ///
    /// Unknown emails, accounts without a password and wrong passwords all
    /// fail with [`AuthError::InvalidCredentials`].
    pub async fn authorize(&self, credentials: &Credentials) -> AuthResult<Identity> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }

        let store = self.backend.store().ok_or_else(|| {
            AuthError::ServiceUnavailable("Credential store is not configured".to_string())
        })?;

        let user = store.find_by_email(&credentials.email).await.map_err(|e| {
            tracing::error!(error = %e, "Credential store lookup failed");
            AuthError::from(e)
        })?;

        let Some(user) = user else {
            tracing::debug!("Sign-in rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = user.hashed_password.as_deref().filter(|h| !h.is_empty()) else {
            tracing::debug!(user_id = %user.id, "Sign-in rejected: no password set");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = match self.hasher.compare(&credentials.password, hash).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                false
            }
        };

        if !matches {
            tracing::debug!(user_id = %user.id, "Sign-in rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(Identity::from(&user))
    }
}
