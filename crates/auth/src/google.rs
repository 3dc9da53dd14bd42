//! Google OAuth 2.0 / OpenID Connect provider.

use async_trait::async_trait;
use entities::FederatedProfile;

use crate::{AuthError, AuthResult, AuthorizationState, FederatedProvider, TokenResponse, UserInfo};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// OAuth client configuration for a provider.
#[derive(Clone)]
pub struct OAuthConfig {
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Callback URL registered with the provider.
    pub redirect_url: String,
    /// Scopes to request.
    pub scopes: Vec<String>,
    /// Authorization endpoint.
    pub auth_url: String,
    /// Token endpoint.
    pub token_url: String,
    /// Userinfo endpoint.
    pub userinfo_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .finish_non_exhaustive()
    }
}

impl OAuthConfig {
    /// Google endpoints and the `openid email profile` scopes.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    /// Overrides the provider endpoints.
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }
}

/// Google sign-in.
#[derive(Debug, Clone)]
pub struct GoogleProvider {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    /// Provider identifier used in routes.
    pub const ID: &'static str = "google";

    /// Creates a new Google provider.
    pub fn new(config: OAuthConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { config, http })
    }

    /// Returns the provider configuration.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

#[async_trait]
impl FederatedProvider for GoogleProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Google"
    }

    fn authorization_url(&self, state: &AuthorizationState) -> AuthResult<String> {
        let mut url = url::Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Configuration(format!("Invalid authorization endpoint: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state.state)
            .append_pair("nonce", &state.nonce)
            .append_pair("code_challenge", &state.code_challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        Ok(url.to_string())
    }

    async fn exchange(
        &self,
        code: &str,
        state: &AuthorizationState,
    ) -> AuthResult<FederatedProfile> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", state.code_verifier.as_str()),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            // The body may echo the code or client details, so only the status is kept.
            return Err(AuthError::Federated(format!(
                "Token endpoint returned {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Federated(format!("Invalid token response: {}", e)))?;

        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Federated(format!(
                "Userinfo endpoint returned {}",
                response.status()
            )));
        }

        let user_info: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Federated(format!("Invalid userinfo response: {}", e)))?;

        user_info.into_profile(Self::ID)
    }
}
