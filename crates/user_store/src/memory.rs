//! In-memory user store implementation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use entities::{FederatedProfile, UserRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{normalize_email, StoreError, StoreResult, UserStore};

/// In-memory user store for testing and single-process mode.
#[derive(Debug, Default, Clone)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, UserRecord>>>,
}

impl MemoryUserStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored users.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns true if no users are stored.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let email = normalize_email(email);
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn create_user(&self, mut user: UserRecord) -> StoreResult<UserRecord> {
        user.email = normalize_email(&user.email);

        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::already_exists(user.email));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn upsert_federated_user(&self, profile: &FederatedProfile) -> StoreResult<UserRecord> {
        let email = normalize_email(&profile.email);
        let mut users = self.users.write().await;

        let email_owner = users.values().find(|u| u.email == email).map(|u| u.id);
        let linked = users
            .values()
            .find(|u| u.provider.as_ref() == Some(&profile.account))
            .map(|u| u.id);

        if let Some(id) = linked {
            if email_owner.is_some_and(|owner| owner != id) {
                return Err(StoreError::already_exists(email));
            }
            if let Some(user) = users.get_mut(&id) {
                user.email = email;
                if profile.name.is_some() {
                    user.name = profile.name.clone();
                }
                user.updated_at = Utc::now();
                return Ok(user.clone());
            }
        }

        if email_owner.is_some() {
            return Err(StoreError::AccountNotLinked(email));
        }

        let mut user = UserRecord::new(email).with_provider(profile.account.clone());
        user.name = profile.name.clone();
        users.insert(user.id, user.clone());

        tracing::debug!(user_id = %user.id, provider = %profile.account.provider, "Created federated user");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use entities::ProviderAccount;

    use super::*;

    fn google_profile(sub: &str, email: &str, name: Option<&str>) -> FederatedProfile {
        FederatedProfile {
            account: ProviderAccount::new("google", sub),
            email: email.to_string(),
            name: name.map(str::to_string),
            picture: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryUserStore::new();
        let user = UserRecord::new("John@Example.com").with_name("John");
        let created = store.create_user(user).await.unwrap();

        assert_eq!(created.email, "john@example.com");

        let by_email = store.find_by_email("JOHN@example.com ").await.unwrap();
        assert_eq!(by_email.as_ref().map(|u| u.id), Some(created.id));

        let by_id = store.find_by_id(created.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.email), Some("john@example.com".to_string()));

        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryUserStore::new();
        store.create_user(UserRecord::new("a@example.com")).await.unwrap();

        let result = store.create_user(UserRecord::new("A@example.com")).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemoryUserStore::new();

        let first = store
            .upsert_federated_user(&google_profile("g-1", "jane@example.com", Some("Jane")))
            .await
            .unwrap();
        assert!(!first.has_password());
        assert!(!first.is_premium);

        let second = store
            .upsert_federated_user(&google_profile("g-1", "jane.doe@example.com", Some("Jane Doe")))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "jane.doe@example.com");
        assert_eq!(second.name.as_deref(), Some("Jane Doe"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_refuses_unlinked_email() {
        let store = MemoryUserStore::new();
        let local = store
            .create_user(
                UserRecord::new("john@example.com")
                    .with_hashed_password("hash")
                    .with_premium(true),
            )
            .await
            .unwrap();

        let result = store
            .upsert_federated_user(&google_profile("g-2", "John@example.com", None))
            .await;
        assert!(matches!(result, Err(StoreError::AccountNotLinked(_))));

        let unchanged = store.find_by_id(local.id).await.unwrap().unwrap();
        assert_eq!(unchanged.provider, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_linked_user_premium() {
        let store = MemoryUserStore::new();
        let linked = UserRecord::new("jane@example.com")
            .with_provider(ProviderAccount::new("google", "g-1"))
            .with_premium(true);
        store.create_user(linked.clone()).await.unwrap();

        let user = store
            .upsert_federated_user(&google_profile("g-1", "jane@example.com", Some("Jane")))
            .await
            .unwrap();
        assert_eq!(user.id, linked.id);
        assert!(user.is_premium);
    }

    #[tokio::test]
    async fn test_upsert_email_change_cannot_take_another_users_email() {
        let store = MemoryUserStore::new();
        store.create_user(UserRecord::new("a@example.com")).await.unwrap();
        let linked = store
            .upsert_federated_user(&google_profile("g-1", "b@example.com", None))
            .await
            .unwrap();

        let result = store
            .upsert_federated_user(&google_profile("g-1", "a@example.com", None))
            .await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));

        let users = store.users.read().await;
        assert_eq!(users.values().filter(|u| u.email == "a@example.com").count(), 1);
        assert_eq!(users[&linked.id].email, "b@example.com");
    }
}
