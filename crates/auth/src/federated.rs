//! Federated (OAuth 2.0 / OpenID Connect) sign-in.
//!
//! A provider builds the authorization URL for the redirect leg and exchanges
//! the returned code for a profile on the callback leg. The authorization
//! state created for the redirect is kept in an [`AuthStateStore`] and taken
//! exactly once by the callback.
//!
//! [`AuthStateStore`]: crate::AuthStateStore

use async_trait::async_trait;
use entities::{FederatedProfile, ProviderAccount};
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult};

/// How long an authorization state stays valid (10 minutes).
pub const AUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// An external identity provider.
#[async_trait]
pub trait FederatedProvider: Send + Sync {
    /// Provider identifier used in routes (e.g. "google").
    fn id(&self) -> &str;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Builds the URL the user agent is redirected to.
    fn authorization_url(&self, state: &AuthorizationState) -> AuthResult<String>;

    /// Exchanges an authorization code for the user's profile.
    async fn exchange(&self, code: &str, state: &AuthorizationState)
        -> AuthResult<FederatedProfile>;
}

/// Authorization state for CSRF protection and PKCE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// CSRF token, echoed back by the provider.
    pub state: String,

    /// Nonce for ID token validation.
    pub nonce: String,

    /// PKCE code verifier.
    pub code_verifier: String,

    /// Provider this state was created for.
    pub provider: String,

    /// Where to send the user after sign-in.
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Timestamp when this state was created.
    pub created_at: i64,
}

impl AuthorizationState {
    /// Creates a new authorization state for a provider.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            state: generate_random_string(32),
            nonce: generate_random_string(32),
            code_verifier: generate_random_string(64),
            provider: provider.into(),
            callback_url: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Sets the post sign-in callback URL.
    pub fn with_callback_url(mut self, callback_url: Option<String>) -> Self {
        self.callback_url = callback_url;
        self
    }

    /// Checks whether this state is older than `max_age_secs`.
    pub fn is_expired(&self, max_age_secs: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now - self.created_at > max_age_secs
    }

    /// PKCE code challenge (S256) for the verifier.
    pub fn code_challenge(&self) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(self.code_verifier.as_bytes());
        base64_url_encode(&hash)
    }
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// The ID token, if the provider issued one.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// User info from the provider's userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// Subject identifier (unique user ID at the provider).
    #[serde(alias = "id")]
    pub sub: String,

    /// User's email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the email is verified.
    #[serde(default, alias = "verified_email")]
    pub email_verified: Option<bool>,

    /// User's name.
    #[serde(default)]
    pub name: Option<String>,

    /// User's given name.
    #[serde(default)]
    pub given_name: Option<String>,

    /// User's family name.
    #[serde(default)]
    pub family_name: Option<String>,

    /// URL to the user's profile picture.
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserInfo {
    /// Converts the userinfo response into a profile for `provider`.
    ///
    /// Fails if the provider did not return an email or reports it as
    /// unverified.
    pub fn into_profile(self, provider: &str) -> AuthResult<FederatedProfile> {
        if self.email_verified == Some(false) {
            return Err(AuthError::Federated("Email address is not verified".to_string()));
        }

        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::Federated("Provider did not return an email".to_string()))?;

        let name = self.name.or_else(|| {
            self.given_name.map(|given| match &self.family_name {
                Some(family) => format!("{} {}", given, family),
                None => given,
            })
        });

        Ok(FederatedProfile {
            account: ProviderAccount::new(provider, self.sub),
            email,
            name,
            picture: self.picture,
        })
    }
}

/// Generates a random alphanumeric string for state/nonce/verifier values.
fn generate_random_string(len: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    URL_SAFE_NO_PAD.encode(data)
}
