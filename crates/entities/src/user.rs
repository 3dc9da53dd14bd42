//! User-related entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user record owned by the credential store.
///
/// Local accounts carry a `hashed_password`; accounts created through a
/// federated provider carry a `provider` link instead and have no password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique identifier.
    pub id: Uuid,
    /// Email address (unique per store).
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Password hash in PHC or bcrypt format.
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    /// Whether the user has a premium subscription.
    pub is_premium: bool,
    /// Federated account link, if the user signed up through a provider.
    pub provider: Option<ProviderAccount>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// Creates a new user with no password and no premium flag.
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: None,
            hashed_password: None,
            is_premium: false,
            provider: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stored password hash.
    pub fn with_hashed_password(mut self, hash: impl Into<String>) -> Self {
        self.hashed_password = Some(hash.into());
        self
    }

    /// Sets the premium flag.
    pub fn with_premium(mut self, is_premium: bool) -> Self {
        self.is_premium = is_premium;
        self
    }

    /// Links the record to a federated provider account.
    pub fn with_provider(mut self, account: ProviderAccount) -> Self {
        self.provider = Some(account);
        self
    }

    /// Returns true if the record can be used for password sign-in.
    pub fn has_password(&self) -> bool {
        self.hashed_password
            .as_deref()
            .is_some_and(|hash| !hash.is_empty())
    }
}

/// Link between a local user and an account at a federated provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Provider identifier (e.g. "google").
    pub provider: String,
    /// Subject identifier at the provider.
    pub provider_account_id: String,
}

impl ProviderAccount {
    /// Creates a new provider account link.
    pub fn new(provider: impl Into<String>, provider_account_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
        }
    }
}

/// Profile data returned by a federated provider, used to create or refresh a
/// [`UserRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedProfile {
    /// Provider account this profile belongs to.
    pub account: ProviderAccount,
    /// Email address reported by the provider.
    pub email: String,
    /// Display name reported by the provider.
    pub name: Option<String>,
    /// Avatar URL reported by the provider.
    pub picture: Option<String>,
}
