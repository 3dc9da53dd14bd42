//! User store trait definition.

use async_trait::async_trait;
use entities::{FederatedProfile, UserRecord};
use uuid::Uuid;

use crate::StoreResult;

/// Lookup and provisioning of user records.
///
/// Email lookups are exact matches on the normalized (trimmed, lowercased)
/// address; implementations normalize on both write and read.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Gets a user by email.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// Gets a user by ID.
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    /// Creates a new user. Fails with `AlreadyExists` if the email is taken.
    async fn create_user(&self, user: UserRecord) -> StoreResult<UserRecord>;

    /// Creates or refreshes the user linked to a federated account.
    ///
    /// Users are matched on `(provider, provider_account_id)` only. An
    /// existing link is updated with the profile's email and name, failing
    /// with `AlreadyExists` if another user holds that email. An unlinked
    /// account whose email belongs to an existing user fails with
    /// `AccountNotLinked`; users are never merged by email. Otherwise a new
    /// user without a password is created. The premium flag of an existing
    /// user is never changed.
    async fn upsert_federated_user(&self, profile: &FederatedProfile) -> StoreResult<UserRecord>;
}

/// Normalizes an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
