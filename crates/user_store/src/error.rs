//! User store error types.

use thiserror::Error;

/// Errors that can occur during user store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// User not found.
    #[error("User not found: {0}")]
    NotFound(String),

    /// A user with the same email already exists.
    #[error("User already exists: {0}")]
    AlreadyExists(String),

    /// The email belongs to a user that is not linked to this provider
    /// account.
    #[error("Account not linked: {0}")]
    AccountNotLinked(String),

    /// Database error.
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store could not be reached or is misconfigured.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Creates an already exists error.
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists(key.into())
    }
}

/// Result type for user store operations.
pub type StoreResult<T> = Result<T, StoreError>;
