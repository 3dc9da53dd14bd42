//! Sign-in orchestration.
//!
//! [`Authenticator`] ties the credential provider, the optional federated
//! providers and the token manager together. It is built once at startup
//! from [`AuthSettings`] and shared by all request handlers.

use std::fmt;
use std::sync::Arc;

use entities::FederatedProfile;
use serde::Serialize;
use user_store::StoreError;

use crate::{
    AUTH_STATE_MAX_AGE_SECS, AuthError, AuthResult, AuthSettings, AuthStateStore,
    AuthorizationState, CredentialBackend, Credentials, CredentialsProvider,
    DefaultPasswordHasher, FederatedProvider, GoogleProvider, Identity, JwtConfig, JwtManager,
    MemoryAuthStateStore, OAuthConfig, Pages, Session,
};

/// Public description of a sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// Provider identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// `credentials` or `oauth`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Route that starts sign-in with this provider.
    pub signin_url: String,
    /// Route that completes sign-in with this provider.
    pub callback_url: String,
}

/// Outcome of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignIn {
    /// Signed session token.
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// Identity the token was issued for.
    pub identity: Identity,
    /// Session derived from the new token.
    pub session: Session,
    /// Where the user asked to go after sign-in, if anywhere.
    pub callback_url: Option<String>,
}

/// Authentication entry point.
pub struct Authenticator {
    credentials: CredentialsProvider,
    federated: Vec<Arc<dyn FederatedProvider>>,
    jwt: JwtManager,
    state_store: Arc<dyn AuthStateStore>,
    pages: Pages,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let federated: Vec<&str> = self.federated.iter().map(|p| p.id()).collect();
        f.debug_struct("Authenticator")
            .field("credentials", &self.credentials)
            .field("federated", &federated)
            .field("jwt", &self.jwt)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Creates an authenticator with credential sign-in only and an
    /// in-memory authorization state store.
    pub fn new(jwt: JwtManager, credentials: CredentialsProvider) -> Self {
        Self {
            credentials,
            federated: Vec::new(),
            jwt,
            state_store: Arc::new(MemoryAuthStateStore::new()),
            pages: Pages::default(),
        }
    }

    /// Builds the authenticator described by `settings`.
    ///
    /// Google sign-in is registered only when both client values are set.
    /// Fails if no signing secret is available.
    pub fn from_settings(settings: &AuthSettings, backend: CredentialBackend) -> AuthResult<Self> {
        let jwt = JwtManager::new(
            JwtConfig::new(settings.signing_secret()?)
                .with_max_age_hours(settings.session.max_age_hours())
                .with_issuer(&settings.issuer),
        );
        let credentials = CredentialsProvider::new(backend, Arc::new(DefaultPasswordHasher::new()));

        let mut authenticator = Self::new(jwt, credentials).with_pages(settings.pages.clone());

        if let Some(google) = &settings.google {
            let provider = GoogleProvider::new(OAuthConfig::google(
                &google.client_id,
                &google.client_secret,
                settings.provider_callback_url(GoogleProvider::ID),
            ))?;
            authenticator = authenticator.with_provider(Arc::new(provider));
        }

        tracing::info!(
            credentials = authenticator.credentials.backend().is_available(),
            federated = authenticator.federated.len(),
            "Authentication configured"
        );

        Ok(authenticator)
    }

    /// Registers a federated provider, replacing any with the same ID.
    pub fn with_provider(mut self, provider: Arc<dyn FederatedProvider>) -> Self {
        self.federated.retain(|p| p.id() != provider.id());
        self.federated.push(provider);
        self
    }

    /// Sets the authorization state store.
    pub fn with_state_store(mut self, store: Arc<dyn AuthStateStore>) -> Self {
        self.state_store = store;
        self
    }

    /// Sets the declared pages.
    pub fn with_pages(mut self, pages: Pages) -> Self {
        self.pages = pages;
        self
    }

    /// Declared pages.
    pub fn pages(&self) -> &Pages {
        &self.pages
    }

    /// Token manager.
    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    /// Lists the registered providers, credentials first.
    pub fn providers(&self) -> Vec<ProviderInfo> {
        let mut providers = vec![ProviderInfo {
            id: CredentialsProvider::ID.to_string(),
            name: "Credentials".to_string(),
            kind: "credentials".to_string(),
            signin_url: format!("/api/auth/signin/{}", CredentialsProvider::ID),
            callback_url: format!("/api/auth/callback/{}", CredentialsProvider::ID),
        }];

        providers.extend(self.federated.iter().map(|p| ProviderInfo {
            id: p.id().to_string(),
            name: p.name().to_string(),
            kind: "oauth".to_string(),
            signin_url: format!("/api/auth/signin/{}", p.id()),
            callback_url: format!("/api/auth/callback/{}", p.id()),
        }));

        providers
    }

    fn federated_provider(&self, provider_id: &str) -> AuthResult<&Arc<dyn FederatedProvider>> {
        self.federated
            .iter()
            .find(|p| p.id() == provider_id)
            .ok_or_else(|| AuthError::ProviderNotConfigured(provider_id.to_string()))
    }

    /// Signs in with an email and password.
    pub async fn sign_in_with_credentials(&self, credentials: &Credentials) -> AuthResult<SignIn> {
        let identity = self.credentials.authorize(credentials).await?;
        tracing::info!(user_id = %identity.id, "Credentials sign-in succeeded");
        self.issue(&identity, None)
    }

    /// Starts a federated sign-in and returns the provider URL to redirect to.
    pub async fn begin_federated(
        &self,
        provider_id: &str,
        callback_url: Option<String>,
    ) -> AuthResult<String> {
        let provider = self.federated_provider(provider_id)?;

        let state = AuthorizationState::new(provider.id()).with_callback_url(callback_url);
        let url = provider.authorization_url(&state)?;
        self.state_store.store(&state).await?;

        tracing::debug!(provider = provider_id, "Federated sign-in started");
        Ok(url)
    }

    /// Completes a federated sign-in.
    ///
    /// The state is consumed whether or not the exchange succeeds. Without a
    /// credential store the identity is built from the provider profile alone.
    pub async fn complete_federated(
        &self,
        provider_id: &str,
        code: &str,
        state_token: &str,
    ) -> AuthResult<SignIn> {
        let provider = self.federated_provider(provider_id)?;

        let state = self
            .state_store
            .take(state_token)
            .await?
            .ok_or_else(|| AuthError::InvalidState("Unknown or already used state".to_string()))?;

        if state.provider != provider.id() {
            return Err(AuthError::InvalidState(
                "State was issued for a different provider".to_string(),
            ));
        }

        if state.is_expired(AUTH_STATE_MAX_AGE_SECS) {
            return Err(AuthError::InvalidState("State has expired".to_string()));
        }

        if code.is_empty() {
            return Err(AuthError::InvalidInput("Missing authorization code".to_string()));
        }

        let profile = provider.exchange(code, &state).await.map_err(|e| {
            tracing::warn!(provider = provider_id, error = %e, "Federated exchange failed");
            e
        })?;

        let identity = self.federated_identity(&profile).await?;
        tracing::info!(
            provider = provider_id,
            user_id = %identity.id,
            "Federated sign-in succeeded"
        );

        self.issue(&identity, state.callback_url)
    }

    async fn federated_identity(&self, profile: &FederatedProfile) -> AuthResult<Identity> {
        match self.credentials.backend().store() {
            Some(store) => {
                let user = store
                    .upsert_federated_user(profile)
                    .await
                    .map_err(|e| match e {
                        StoreError::AccountNotLinked(email) | StoreError::AlreadyExists(email) => {
                            tracing::warn!(
                                provider = %profile.account.provider,
                                "Federated email belongs to an unlinked account"
                            );
                            AuthError::AccountNotLinked(email)
                        }
                        e => {
                            tracing::error!(error = %e, "Failed to persist federated user");
                            AuthError::from(e)
                        }
                    })?;
                Ok(Identity::from(&user))
            }
            None => Ok(Identity {
                id: profile.account.provider_account_id.clone(),
                email: profile.email.clone(),
                name: profile.name.clone(),
                is_premium: false,
            }),
        }
    }

    fn issue(&self, identity: &Identity, callback_url: Option<String>) -> AuthResult<SignIn> {
        let (token, claims) = self.jwt.issue(identity)?;
        Ok(SignIn {
            token,
            expires_in: self.jwt.max_age_seconds(),
            identity: identity.clone(),
            session: Session::from_claims(&claims),
            callback_url,
        })
    }

    /// Reads the session carried by a token and reissues the token with a
    /// fresh expiry.
    pub fn session(&self, token: &str) -> AuthResult<(Session, String)> {
        let (token, claims) = self.jwt.refresh(token)?;
        Ok((Session::from_claims(&claims), token))
    }

    /// Reads the session carried by a token without reissuing it.
    pub fn verify(&self, token: &str) -> AuthResult<Session> {
        let claims = self.jwt.validate_token(token)?;
        Ok(Session::from_claims(&claims))
    }

    /// Drops authorization states older than the allowed age.
    pub async fn cleanup_expired_states(&self) -> AuthResult<usize> {
        self.state_store
            .cleanup_expired(AUTH_STATE_MAX_AGE_SECS)
            .await
    }
}
