//! Authentication settings loaded from the environment.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    AuthError, AuthResult, DEFAULT_SESSION_MAX_AGE_HOURS, DEFAULT_TOKEN_ISSUER,
    MAX_SESSION_MAX_AGE_HOURS,
};

/// Signing secret used when none is configured outside production.
pub const FALLBACK_SECRET: &str = "authgate-insecure-development-secret";

/// Default public base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; a missing secret falls back to [`FALLBACK_SECRET`].
    #[default]
    Development,
    /// Production; a missing secret is a startup error.
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// How sessions are carried between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum SessionStrategy {
    /// Stateless signed tokens; no server-side session store.
    Jwt {
        /// Token lifetime in hours.
        max_age_hours: u64,
    },
}

impl Default for SessionStrategy {
    fn default() -> Self {
        SessionStrategy::Jwt {
            max_age_hours: DEFAULT_SESSION_MAX_AGE_HOURS,
        }
    }
}

impl SessionStrategy {
    /// Token lifetime in hours.
    pub fn max_age_hours(&self) -> u64 {
        match self {
            SessionStrategy::Jwt { max_age_hours } => *max_age_hours,
        }
    }
}

/// Pages the session layer redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pages {
    /// Sign-in page.
    pub sign_in: String,
    /// Error page; receives an `error` query parameter.
    pub error: String,
}

impl Default for Pages {
    fn default() -> Self {
        Self {
            sign_in: "/auth/signin".to_string(),
            error: "/auth/error".to_string(),
        }
    }
}

impl Pages {
    /// Error page URL carrying `code`.
    pub fn error_url(&self, code: &str) -> String {
        let separator = if self.error.contains('?') { '&' } else { '?' };
        format!("{}{}error={}", self.error, separator, urlencode(code))
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Google client credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Authentication settings.
///
/// Optional capabilities (database, Google) are `None` when their variables
/// are unset; nothing here fails because a capability is missing.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Database URL enabling the persistent user store.
    pub database_url: Option<String>,
    /// Google client credentials enabling Google sign-in.
    pub google: Option<GoogleCredentials>,
    /// Token signing secret.
    pub secret: Option<String>,
    /// Deployment environment.
    pub environment: Environment,
    /// Public base URL used to build provider callback URLs.
    pub base_url: String,
    /// Session strategy.
    pub session: SessionStrategy,
    /// Declared pages.
    pub pages: Pages,
    /// Token issuer.
    pub issuer: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("database_configured", &self.database_url.is_some())
            .field("google", &self.google)
            .field("secret_configured", &self.secret.is_some())
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("pages", &self.pages)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            google: None,
            secret: None,
            environment: Environment::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            session: SessionStrategy::default(),
            pages: Pages::default(),
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
        }
    }
}

impl AuthSettings {
    /// Loads settings from process environment variables.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings from a map of variables.
    pub fn from_map(vars: &HashMap<String, String>) -> AuthResult<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AuthResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let google = match (get("GOOGLE_CLIENT_ID"), get("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleCredentials {
                client_id,
                client_secret,
            }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET is set; Google sign-in disabled"
                );
                None
            }
            (None, None) => None,
        };

        let max_age_hours = match get("AUTHGATE_SESSION_MAX_AGE_HOURS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                AuthError::Configuration(format!(
                    "AUTHGATE_SESSION_MAX_AGE_HOURS must be a positive integer, got {}",
                    value
                ))
            })?,
            None => DEFAULT_SESSION_MAX_AGE_HOURS,
        };
        if max_age_hours == 0 {
            return Err(AuthError::Configuration(
                "AUTHGATE_SESSION_MAX_AGE_HOURS must be greater than zero".to_string(),
            ));
        }
        if max_age_hours > MAX_SESSION_MAX_AGE_HOURS {
            return Err(AuthError::Configuration(format!(
                "AUTHGATE_SESSION_MAX_AGE_HOURS must be at most {}, got {}",
                MAX_SESSION_MAX_AGE_HOURS, max_age_hours
            )));
        }

        let settings = Self {
            database_url: get("DATABASE_URL"),
            google,
            secret: get("AUTHGATE_SECRET"),
            environment: get("AUTHGATE_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or_default(),
            base_url: get("AUTHGATE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            session: SessionStrategy::Jwt { max_age_hours },
            pages: Pages {
                sign_in: get("AUTHGATE_SIGNIN_PAGE").unwrap_or(defaults.pages.sign_in),
                error: get("AUTHGATE_ERROR_PAGE").unwrap_or(defaults.pages.error),
            },
            issuer: get("AUTHGATE_ISSUER").unwrap_or(defaults.issuer),
        };

        // Fail at startup rather than at the first sign-in.
        settings.signing_secret()?;

        Ok(settings)
    }

    /// Returns the secret tokens are signed with.
    ///
    /// Without a configured secret this is [`FALLBACK_SECRET`] in development
    /// and a configuration error in production.
    pub fn signing_secret(&self) -> AuthResult<String> {
        match (&self.secret, self.environment) {
            (Some(secret), _) => Ok(secret.clone()),
            (None, Environment::Production) => Err(AuthError::Configuration(
                "AUTHGATE_SECRET is required when AUTHGATE_ENV=production".to_string(),
            )),
            (None, Environment::Development) => {
                tracing::warn!("AUTHGATE_SECRET is not set; signing tokens with the insecure fallback secret");
                Ok(FALLBACK_SECRET.to_string())
            }
        }
    }

    /// Callback URL registered with a federated provider.
    pub fn provider_callback_url(&self, provider: &str) -> String {
        format!("{}/api/auth/callback/{}", self.base_url, provider)
    }
}
