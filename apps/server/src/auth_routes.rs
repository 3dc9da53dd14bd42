//! Authentication route handlers
//!
//! This module provides REST endpoints for authentication:
//! - `/api/auth/providers` - List sign-in providers and pages
//! - `/api/auth/signin/{provider}` - Start federated sign-in
//! - `/api/auth/callback/{provider}` - Credentials sign-in (POST) or
//!   federated callback (GET)
//! - `/api/auth/session` - Read and refresh the current session
//! - `/api/auth/signout` - Sign out (client-side token invalidation)
//! - `/api/me` - Current user, behind the session middleware

use auth::{Credentials, CredentialsProvider, Pages, ProviderInfo, Session, SessionUser, SignIn};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::HeaderMap,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{PageError, ServerError, ServerResult},
    middleware::bearer_token,
    state::AppState,
};

/// Provider listing
#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Offered providers, credentials first
    pub providers: Vec<ProviderInfo>,

    /// Declared sign-in and error pages
    pub pages: Pages,
}

/// Sign-in request (for starting federated sign-in)
#[derive(Debug, Deserialize)]
pub struct SignInParams {
    /// Where to send the user after sign-in
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Sign-in response
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    /// URL to redirect to for authentication
    pub auth_url: String,
}

/// Callback query parameters
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code from the provider
    #[serde(default)]
    pub code: Option<String>,

    /// State parameter for CSRF protection
    #[serde(default)]
    pub state: Option<String>,

    /// Optional error from provider
    #[serde(default)]
    pub error: Option<String>,

    /// Optional error description
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Token response to client
#[derive(Debug, Serialize)]
pub struct AuthTokenResponse {
    /// JWT access token
    pub access_token: String,

    /// Token type (always "Bearer")
    pub token_type: String,

    /// When the token expires (in seconds)
    pub expires_in: u64,

    /// Session carried by the token
    pub session: Session,

    /// Callback URL (if provided when sign-in started)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl From<SignIn> for AuthTokenResponse {
    fn from(sign_in: SignIn) -> Self {
        Self {
            access_token: sign_in.token,
            token_type: "Bearer".to_string(),
            expires_in: sign_in.expires_in,
            session: sign_in.session,
            callback_url: sign_in.callback_url,
        }
    }
}

/// Session response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Current session
    pub session: Session,

    /// Reissued token with a fresh expiry
    pub access_token: String,
}

/// Validate a redirect URI against allowed patterns
///
/// Returns true if the redirect URI is allowed, false otherwise.
/// This prevents open redirect vulnerabilities.
fn is_valid_redirect_uri(redirect_uri: &str, allowed_origins: &[String]) -> bool {
    // Browsers strip tabs and newlines before resolving the URL
    if redirect_uri.chars().any(char::is_control) {
        return false;
    }

    let is_relative_path = |uri: &str| {
        uri.starts_with('/') && !uri.starts_with("//") && !uri.starts_with("/\\")
    };

    // If no allowed origins are configured, only allow relative paths
    if allowed_origins.is_empty() {
        return is_relative_path(redirect_uri);
    }

    let url = match url::Url::parse(redirect_uri) {
        Ok(url) => url,
        Err(_) => return is_relative_path(redirect_uri),
    };

    let redirect_origin = url.origin().ascii_serialization();

    allowed_origins.iter().any(|allowed| {
        // Wildcard subdomains (e.g., "*.example.com")
        if let Some(domain) = allowed.strip_prefix("*.") {
            url.host_str().is_some_and(|host| {
                host == domain
                    || host
                        .strip_suffix(domain)
                        .is_some_and(|sub| sub.len() > 1 && sub.ends_with('.'))
            })
        } else {
            redirect_origin == allowed.trim_end_matches('/')
        }
    })
}

/// List providers and declared pages
pub async fn providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.authenticator.providers(),
        pages: state.authenticator.pages().clone(),
    })
}

/// Start sign-in with a provider
pub async fn sign_in(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<SignInParams>,
) -> ServerResult<Json<SignInResponse>> {
    let pages = state.authenticator.pages();

    if let Some(ref callback_url) = params.callback_url {
        if !is_valid_redirect_uri(callback_url, &state.config.allowed_redirect_origins) {
            warn!(callback_url = %callback_url, "Invalid callback URL rejected");
            return Err(PageError::new(
                ServerError::InvalidRequest("The provided callback URL is not allowed".to_string()),
                pages,
            ));
        }
    }

    // Credentials are submitted from the sign-in page
    if provider == CredentialsProvider::ID {
        return Ok(Json(SignInResponse {
            auth_url: pages.sign_in.clone(),
        }));
    }

    let auth_url = state
        .authenticator
        .begin_federated(&provider, params.callback_url)
        .await
        .map_err(|e| PageError::new(e, pages))?;

    info!(provider = %provider, "Initiating federated sign-in");

    Ok(Json(SignInResponse { auth_url }))
}

/// Sign in with email and password
pub async fn credentials_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ServerResult<Json<AuthTokenResponse>> {
    let pages = state.authenticator.pages();

    if provider != CredentialsProvider::ID {
        return Err(PageError::new(
            auth::AuthError::ProviderNotConfigured(provider),
            pages,
        ));
    }

    let Json(credentials) = body.map_err(|e| {
        PageError::new(auth::AuthError::InvalidInput(e.body_text()), pages)
    })?;

    let sign_in = state
        .authenticator
        .sign_in_with_credentials(&credentials)
        .await
        .map_err(|e| PageError::new(e, pages))?;

    Ok(Json(sign_in.into()))
}

/// Handle a federated provider callback
pub async fn federated_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> ServerResult<Json<AuthTokenResponse>> {
    let pages = state.authenticator.pages();

    // Check for error from provider
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "Authentication failed".to_string());
        warn!(provider = %provider, error = %error, description = %description, "Provider returned an error");
        return Err(PageError::new(ServerError::ProviderDenied(error), pages));
    }

    let (Some(code), Some(state_token)) = (params.code, params.state) else {
        return Err(PageError::new(
            auth::AuthError::InvalidInput("Missing code or state".to_string()),
            pages,
        ));
    };

    let sign_in = state
        .authenticator
        .complete_federated(&provider, &code, &state_token)
        .await
        .map_err(|e| PageError::new(e, pages))?;

    Ok(Json(sign_in.into()))
}

/// Read the current session and reissue its token
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Json<SessionResponse>> {
    let pages = state.authenticator.pages();

    let token = bearer_token(&headers)
        .ok_or_else(|| PageError::new(ServerError::AuthenticationRequired, pages))?;

    let (session, access_token) = state
        .authenticator
        .session(token)
        .map_err(|e| PageError::new(e, pages))?;

    Ok(Json(SessionResponse {
        session,
        access_token,
    }))
}

/// Sign out (just confirms the action, actual token invalidation is client-side)
pub async fn sign_out() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Signed out. Please discard your tokens.",
    }))
}

/// Get the signed-in user
pub async fn me(Extension(session): Extension<Session>) -> Json<Option<SessionUser>> {
    Json(session.user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_relative_paths() {
        let allowed: Vec<String> = vec![];

        // Valid relative paths
        assert!(is_valid_redirect_uri("/dashboard", &allowed));
        assert!(is_valid_redirect_uri("/path?query=value", &allowed));

        // Invalid paths (protocol-relative or absolute)
        assert!(!is_valid_redirect_uri("//evil.com/path", &allowed));
        assert!(!is_valid_redirect_uri("/\\evil.com/path", &allowed));
        assert!(!is_valid_redirect_uri("https://evil.com", &allowed));
    }

    #[test]
    fn test_validate_rejects_control_characters() {
        let none: Vec<String> = vec![];
        let allowed = vec!["https://app.example.com".to_string()];

        for uri in ["/\t/evil.com", "/\n/evil.com", "/\r\n/evil.com", "/dash\u{0}board"] {
            assert!(!is_valid_redirect_uri(uri, &none), "{:?}", uri);
            assert!(!is_valid_redirect_uri(uri, &allowed), "{:?}", uri);
        }
        assert!(!is_valid_redirect_uri("https://app.example.com/\tcallback", &allowed));
    }

    #[test]
    fn test_validate_allowed_origins() {
        let allowed = vec![
            "https://app.example.com".to_string(),
            "https://localhost:3000".to_string(),
        ];

        assert!(is_valid_redirect_uri("https://app.example.com/callback", &allowed));
        assert!(is_valid_redirect_uri("https://localhost:3000/auth", &allowed));
        assert!(is_valid_redirect_uri("/dashboard", &allowed));

        assert!(!is_valid_redirect_uri("https://evil.com/callback", &allowed));
        assert!(!is_valid_redirect_uri("https://app.example.com.evil.com", &allowed));
        assert!(!is_valid_redirect_uri("http://app.example.com/callback", &allowed));
    }

    #[test]
    fn test_validate_wildcard_subdomains() {
        let allowed = vec!["*.example.com".to_string()];

        assert!(is_valid_redirect_uri("https://app.example.com/callback", &allowed));
        assert!(is_valid_redirect_uri("https://example.com/callback", &allowed));

        assert!(!is_valid_redirect_uri("https://example.org", &allowed));
        assert!(!is_valid_redirect_uri("https://notexample.com/callback", &allowed));
    }
}
