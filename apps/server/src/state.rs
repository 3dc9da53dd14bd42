//! Application state

use std::sync::Arc;

use auth::{Authenticator, CredentialBackend};

use crate::config::ServerConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Sign-in and session handling
    pub authenticator: Arc<Authenticator>,

    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state
    ///
    /// A configured but unreachable database leaves credentials sign-in
    /// unavailable instead of stopping the server.
    pub async fn new(config: ServerConfig) -> Result<Self, StateError> {
        let backend = match &config.auth.database_url {
            Some(url) => match user_store::connect(url).await {
                Ok(store) => {
                    tracing::info!("Credential store connected");
                    CredentialBackend::Available(store)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to connect credential store");
                    CredentialBackend::Absent
                }
            },
            None => CredentialBackend::Absent,
        };

        let authenticator = Authenticator::from_settings(&config.auth, backend)
            .map_err(|e| StateError::Auth(e.to_string()))?;

        Ok(Self::from_parts(authenticator, config))
    }

    /// Assemble state from an already built authenticator
    pub fn from_parts(authenticator: Authenticator, config: ServerConfig) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            config: Arc::new(config),
        }
    }
}

/// State initialization errors
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to initialize auth: {0}")]
    Auth(String),
}
