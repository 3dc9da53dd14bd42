//! Authgate server library
//!
//! Exposes the router and its parts for the binary and for tests.

pub mod auth_routes;
pub mod config;
pub mod error;
pub mod middleware;
pub mod state;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use state::AppState;

/// Creates the application router with all routes configured.
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/me", get(auth_routes::me))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    Router::new()
        .route("/api/auth/providers", get(auth_routes::providers))
        .route("/api/auth/signin/{provider}", get(auth_routes::sign_in))
        .route(
            "/api/auth/callback/{provider}",
            get(auth_routes::federated_callback).post(auth_routes::credentials_callback),
        )
        .route("/api/auth/session", get(auth_routes::session))
        .route("/api/auth/signout", post(auth_routes::sign_out))
        .route("/health", get(health_check))
        .merge(protected)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if !config.enable_cors {
        return CorsLayer::new();
    }

    if config.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|s| match s.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %s, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Initializes tracing with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "authgate_server={level},auth={level},user_store={level},tower_http=debug",
            level = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use auth::{
        AuthError, AuthResult, AuthorizationState, Authenticator, CredentialBackend,
        CredentialsProvider, DefaultPasswordHasher, FederatedProvider, JwtConfig, JwtManager,
        PasswordHasher,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use entities::{FederatedProfile, ProviderAccount, UserRecord};
    use serde_json::Value;
    use tower::ServiceExt;
    use user_store::{MemoryUserStore, UserStore};

    use super::*;

    const SECRET: &str = "test-secret-key-must-be-long-enough-for-security";

    struct StubProvider;

    #[async_trait]
    impl FederatedProvider for StubProvider {
        fn id(&self) -> &str {
            "stub"
        }

        fn name(&self) -> &str {
            "Stub"
        }

        fn authorization_url(&self, state: &AuthorizationState) -> AuthResult<String> {
            Ok(format!("https://idp.example.com/authorize?state={}", state.state))
        }

        async fn exchange(
            &self,
            code: &str,
            _state: &AuthorizationState,
        ) -> AuthResult<FederatedProfile> {
            if code != "good-code" {
                return Err(AuthError::Federated("invalid_grant".to_string()));
            }
            Ok(FederatedProfile {
                account: ProviderAccount::new("stub", "stub-42"),
                email: "fed@example.com".to_string(),
                name: None,
                picture: None,
            })
        }
    }

    async fn app(backend: CredentialBackend) -> Router {
        let authenticator = Authenticator::new(
            JwtManager::new(JwtConfig::new(SECRET)),
            CredentialsProvider::new(backend, Arc::new(DefaultPasswordHasher::new())),
        )
        .with_provider(Arc::new(StubProvider));

        create_app(AppState::from_parts(authenticator, ServerConfig::default()))
    }

    async fn app_with_john() -> Router {
        let store = MemoryUserStore::new();
        let hash = DefaultPasswordHasher::new().hash("secret123").await.unwrap();
        store
            .create_user(
                UserRecord::new("john@example.com")
                    .with_name("John")
                    .with_hashed_password(hash),
            )
            .await
            .unwrap();
        app(CredentialBackend::Available(Arc::new(store))).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn sign_in_request(email: &str, password: &str) -> Request<Body> {
        Request::post("/api/auth/callback/credentials")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({ "email": email, "password": password }).to_string(),
            ))
            .unwrap()
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(CredentialBackend::Absent)
            .await
            .oneshot(get("/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_providers() {
        let (status, body) = send(
            app(CredentialBackend::Absent).await,
            get("/api/auth/providers", None),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["providers"][0]["id"], "credentials");
        assert_eq!(body["providers"][1]["id"], "stub");
        assert_eq!(body["pages"]["signIn"], "/auth/signin");
        assert_eq!(body["pages"]["error"], "/auth/error");
    }

    #[tokio::test]
    async fn test_credentials_sign_in_then_me() {
        let app = app_with_john().await;

        let (status, body) = send(app.clone(), sign_in_request("john@example.com", "secret123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["session"]["user"]["email"], "john@example.com");
        assert_eq!(body["session"]["user"]["name"], "John");
        assert_eq!(body["session"]["user"]["isPremium"], false);

        let token = body["access_token"].as_str().unwrap();
        let (status, body) = send(app, get("/api/me", Some(token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "john@example.com");
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let (status, body) = send(
            app_with_john().await,
            sign_in_request("john@example.com", "wrong"),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");
        assert_eq!(body["redirect"], "/auth/error?error=CredentialsSignin");
    }

    #[tokio::test]
    async fn test_empty_fields_are_bad_request() {
        let (status, body) = send(app_with_john().await, sign_in_request("", "")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let request = Request::post("/api/auth/callback/credentials")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(app_with_john().await, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_credentials_without_database() {
        let (status, body) = send(
            app(CredentialBackend::Absent).await,
            sign_in_request("john@example.com", "secret123"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "service_unavailable");
        assert_eq!(body["redirect"], "/auth/error?error=Configuration");
    }

    #[tokio::test]
    async fn test_federated_flow_without_database() {
        let app = app(CredentialBackend::Absent).await;

        let (status, body) = send(
            app.clone(),
            get("/api/auth/signin/stub?callback_url=/dashboard", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let auth_url = url::Url::parse(body["auth_url"].as_str().unwrap()).unwrap();
        let query: HashMap<_, _> = auth_url.query_pairs().into_owned().collect();
        let state = &query["state"];

        let (status, body) = send(
            app.clone(),
            get(&format!("/api/auth/callback/stub?code=good-code&state={}", state), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["callback_url"], "/dashboard");
        assert_eq!(body["session"]["user"]["id"], "stub-42");

        // The state is single use
        let (status, body) = send(
            app,
            get(&format!("/api/auth/callback/stub?code=good-code&state={}", state), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["redirect"], "/auth/error?error=OAuthCallback");
    }

    #[tokio::test]
    async fn test_federated_email_of_unlinked_account_is_refused() {
        let store = MemoryUserStore::new();
        store
            .create_user(UserRecord::new("fed@example.com").with_hashed_password("hash"))
            .await
            .unwrap();
        let app = app(CredentialBackend::Available(Arc::new(store))).await;

        let (_, body) = send(app.clone(), get("/api/auth/signin/stub", None)).await;
        let auth_url = url::Url::parse(body["auth_url"].as_str().unwrap()).unwrap();
        let query: HashMap<_, _> = auth_url.query_pairs().into_owned().collect();

        let (status, body) = send(
            app,
            get(
                &format!("/api/auth/callback/stub?code=good-code&state={}", query["state"]),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "account_not_linked");
        assert_eq!(body["redirect"], "/auth/error?error=OAuthAccountNotLinked");
    }

    #[tokio::test]
    async fn test_provider_error_callback() {
        let (status, body) = send(
            app(CredentialBackend::Absent).await,
            get("/api/auth/callback/stub?error=access_denied", None),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["redirect"], "/auth/error?error=OAuthCallback");
    }

    #[tokio::test]
    async fn test_foreign_callback_url_rejected() {
        let (status, _) = send(
            app(CredentialBackend::Absent).await,
            get("/api/auth/signin/stub?callback_url=https://evil.com", None),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let (status, _) = send(
            app(CredentialBackend::Absent).await,
            get("/api/auth/signin/github", None),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_refresh() {
        let app = app_with_john().await;
        let (_, body) = send(app.clone(), sign_in_request("john@example.com", "secret123")).await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = send(app, get("/api/auth/session", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["user"]["email"], "john@example.com");
        assert_ne!(body["access_token"].as_str().unwrap(), token);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = app(CredentialBackend::Absent).await;

        let (status, body) = send(app.clone(), get("/api/me", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "missing_token");

        let (status, body) = send(app, get("/api/me", Some("not-a-token"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_token");
    }

    #[tokio::test]
    async fn test_sign_out() {
        let request = Request::post("/api/auth/signout").body(Body::empty()).unwrap();
        let (status, body) = send(app(CredentialBackend::Absent).await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }
}
