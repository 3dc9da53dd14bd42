//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request is missing required fields or is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown user, missing password hash, or wrong password.
    ///
    /// These cases share one variant and one message so callers cannot tell
    /// which accounts exist.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The credential store is absent or unreachable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// JWT encoding failed.
    #[error("JWT encoding failed: {0}")]
    JwtEncoding(String),

    /// JWT validation failed for a reason other than expiry or malformation.
    #[error("JWT validation failed: {0}")]
    JwtValidation(String),

    /// Token expired.
    #[error("Token expired")]
    TokenExpired,

    /// Invalid token.
    #[error("Invalid token")]
    InvalidToken,

    /// Unknown, reused or expired authorization state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The requested federated provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The federated provider rejected the exchange or returned bad data.
    #[error("Federated login failed: {0}")]
    Federated(String),

    /// The federated account's email belongs to a user it is not linked to.
    #[error("Account not linked: {0}")]
    AccountNotLinked(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Password hashing failed.
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Short machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::JwtEncoding(_) => "token_error",
            AuthError::JwtValidation(_) | AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidState(_) => "invalid_state",
            AuthError::ProviderNotConfigured(_) => "provider_not_configured",
            AuthError::Federated(_) | AuthError::Http(_) => "federated_error",
            AuthError::AccountNotLinked(_) => "account_not_linked",
            AuthError::PasswordHash(_) => "server_error",
            AuthError::Configuration(_) => "configuration_error",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::InvalidSignature
            | jsonwebtoken::errors::ErrorKind::InvalidIssuer
            | jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_) => AuthError::InvalidToken,
            _ => AuthError::JwtValidation(e.to_string()),
        }
    }
}

impl From<user_store::StoreError> for AuthError {
    fn from(e: user_store::StoreError) -> Self {
        match e {
            user_store::StoreError::AccountNotLinked(email) => AuthError::AccountNotLinked(email),
            e => AuthError::ServiceUnavailable(e.to_string()),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
