//! Storage for pending federated sign-ins.
//!
//! A state is stored when the user is sent to the provider and taken when
//! the provider redirects back, so each state can complete at most one
//! sign-in.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{AuthResult, AuthorizationState};

/// Trait for authorization state storage.
#[async_trait]
pub trait AuthStateStore: Send + Sync {
    /// Stores an authorization state.
    async fn store(&self, state: &AuthorizationState) -> AuthResult<()>;

    /// Removes and returns the state for `state_token`, if present.
    async fn take(&self, state_token: &str) -> AuthResult<Option<AuthorizationState>>;

    /// Removes states older than `max_age_secs` and returns how many were
    /// removed.
    async fn cleanup_expired(&self, max_age_secs: i64) -> AuthResult<usize>;
}

/// In-memory authorization state store.
#[derive(Debug, Default)]
pub struct MemoryAuthStateStore {
    states: RwLock<HashMap<String, AuthorizationState>>,
}

impl MemoryAuthStateStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending states.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Returns true if no states are pending.
    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl AuthStateStore for MemoryAuthStateStore {
    async fn store(&self, state: &AuthorizationState) -> AuthResult<()> {
        self.states
            .write()
            .await
            .insert(state.state.clone(), state.clone());
        Ok(())
    }

    async fn take(&self, state_token: &str) -> AuthResult<Option<AuthorizationState>> {
        Ok(self.states.write().await.remove(state_token))
    }

    async fn cleanup_expired(&self, max_age_secs: i64) -> AuthResult<usize> {
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, state| !state.is_expired(max_age_secs));
        Ok(before - states.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AUTH_STATE_MAX_AGE_SECS;

    #[tokio::test]
    async fn test_take_is_single_use() {
        let store = MemoryAuthStateStore::new();
        let state = AuthorizationState::new("google");

        store.store(&state).await.unwrap();

        let taken = store.take(&state.state).await.unwrap();
        assert_eq!(taken, Some(state.clone()));
        assert!(store.take(&state.state).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_state() {
        let store = MemoryAuthStateStore::new();
        assert!(store.take("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemoryAuthStateStore::new();

        let mut old_state = AuthorizationState::new("google");
        old_state.created_at = chrono::Utc::now().timestamp() - 1000;
        let fresh_state = AuthorizationState::new("google");

        store.store(&old_state).await.unwrap();
        store.store(&fresh_state).await.unwrap();

        let removed = store.cleanup_expired(AUTH_STATE_MAX_AGE_SECS).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.take(&fresh_state.state).await.unwrap().is_some());
    }
}
