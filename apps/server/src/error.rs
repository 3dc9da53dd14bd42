//! Server error types.

use auth::{AuthError, Pages};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error body returned by every auth route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub error_description: String,
    /// Error page the client should send the user to.
    pub redirect: String,
}

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No bearer token on a route that needs one.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The federated provider redirected back with an error.
    #[error("Provider returned an error: {0}")]
    ProviderDenied(String),

    /// Authentication error.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ServerError::ProviderDenied(_) => StatusCode::UNAUTHORIZED,
            ServerError::Auth(e) => match e {
                AuthError::InvalidInput(_) | AuthError::InvalidState(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials
                | AuthError::TokenExpired
                | AuthError::InvalidToken
                | AuthError::JwtValidation(_) => StatusCode::UNAUTHORIZED,
                AuthError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AuthError::ProviderNotConfigured(_) => StatusCode::NOT_FOUND,
                AuthError::AccountNotLinked(_) => StatusCode::CONFLICT,
                AuthError::Federated(_) | AuthError::Http(_) => StatusCode::BAD_GATEWAY,
                AuthError::Configuration(_)
                | AuthError::JwtEncoding(_)
                | AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Error page code, as understood by the sign-in front-end.
    pub fn page_code(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) | ServerError::AuthenticationRequired => {
                "AccessDenied"
            }
            ServerError::ProviderDenied(_) => "OAuthCallback",
            ServerError::Auth(e) => match e {
                AuthError::InvalidInput(_) | AuthError::InvalidCredentials => "CredentialsSignin",
                AuthError::TokenExpired | AuthError::InvalidToken | AuthError::JwtValidation(_) => {
                    "SessionRequired"
                }
                AuthError::InvalidState(_) | AuthError::Federated(_) | AuthError::Http(_) => {
                    "OAuthCallback"
                }
                AuthError::ProviderNotConfigured(_) => "OAuthSignin",
                AuthError::AccountNotLinked(_) => "OAuthAccountNotLinked",
                AuthError::ServiceUnavailable(_)
                | AuthError::Configuration(_)
                | AuthError::JwtEncoding(_)
                | AuthError::PasswordHash(_) => "Configuration",
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::AuthenticationRequired => "missing_token",
            ServerError::ProviderDenied(_) => "access_denied",
            ServerError::Auth(e) => e.code(),
        }
    }

    /// Description safe to show to clients.
    fn description(&self) -> String {
        match self {
            ServerError::Auth(
                AuthError::Configuration(_)
                | AuthError::JwtEncoding(_)
                | AuthError::PasswordHash(_),
            ) => "Server configuration error".to_string(),
            ServerError::Auth(AuthError::ServiceUnavailable(_)) => {
                "Sign-in is temporarily unavailable".to_string()
            }
            ServerError::Auth(AuthError::Http(_)) => {
                "Could not reach the identity provider".to_string()
            }
            ServerError::Auth(AuthError::AccountNotLinked(_)) => {
                "This email is already used by another account".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Builds the JSON body, pointing `redirect` at the error page.
    pub fn body(&self, pages: &Pages) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            error_description: self.description(),
            redirect: pages.error_url(self.page_code()),
        }
    }

    /// Renders the error with the given pages.
    pub fn into_response_with(self, pages: &Pages) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (self.status(), Json(self.body(pages))).into_response()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.into_response_with(&Pages::default())
    }
}

/// Error bound to the pages it should redirect to.
pub struct PageError {
    error: ServerError,
    pages: Pages,
}

impl PageError {
    /// Binds `error` to `pages`.
    pub fn new(error: impl Into<ServerError>, pages: &Pages) -> Self {
        Self {
            error: error.into(),
            pages: pages.clone(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        self.error.into_response_with(&self.pages)
    }
}

/// Result type alias for route handlers.
pub type ServerResult<T> = Result<T, PageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::ProviderNotConfigured("x".into()), StatusCode::NOT_FOUND),
            (AuthError::Federated("x".into()), StatusCode::BAD_GATEWAY),
            (AuthError::AccountNotLinked("x".into()), StatusCode::CONFLICT),
            (AuthError::Configuration("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(ServerError::from(error).status(), status);
        }
    }

    #[test]
    fn test_credentials_error_redirects_to_error_page() {
        let body = ServerError::from(AuthError::InvalidCredentials).body(&Pages::default());

        assert_eq!(body.error, "invalid_credentials");
        assert_eq!(body.error_description, "Invalid credentials");
        assert_eq!(body.redirect, "/auth/error?error=CredentialsSignin");
    }

    #[test]
    fn test_unlinked_account_redirects_to_error_page() {
        let body = ServerError::from(AuthError::AccountNotLinked("a@example.com".into()))
            .body(&Pages::default());

        assert_eq!(body.error, "account_not_linked");
        assert!(!body.error_description.contains("a@example.com"));
        assert_eq!(body.redirect, "/auth/error?error=OAuthAccountNotLinked");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let body = ServerError::from(AuthError::Configuration(
            "AUTHGATE_SECRET is required".into(),
        ))
        .body(&Pages::default());

        assert_eq!(body.error_description, "Server configuration error");
        assert_eq!(body.redirect, "/auth/error?error=Configuration");
    }
}
