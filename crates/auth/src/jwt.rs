//! JWT token generation and validation.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AuthError, AuthResult, DEFAULT_SESSION_MAX_AGE_HOURS, DEFAULT_TOKEN_ISSUER, Identity,
    MAX_SESSION_MAX_AGE_HOURS, callbacks,
};

/// Token lifetime, capped at [`MAX_SESSION_MAX_AGE_HOURS`].
fn lifetime(max_age_hours: u64) -> TimeDelta {
    let hours = max_age_hours.min(MAX_SESSION_MAX_AGE_HOURS) as i64;
    TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX)
}

/// Claims carried by a session token.
///
/// The identity fields are empty until the token callback copies an
/// identity onto them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// Email address.
    pub email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Premium flag.
    #[serde(default, rename = "isPremium")]
    pub is_premium: bool,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// JWT ID.
    pub jti: String,
}

impl Claims {
    /// Creates claims with fresh timestamps and no identity.
    pub fn blank(issuer: impl Into<String>, max_age_hours: u64) -> Self {
        let mut claims = Self {
            sub: String::new(),
            email: String::new(),
            name: None,
            is_premium: false,
            iat: 0,
            exp: 0,
            iss: issuer.into(),
            jti: String::new(),
        };
        claims.restamp(max_age_hours);
        claims
    }

    /// Resets `iat`, `exp` and `jti` as if the token were issued now.
    ///
    /// Lifetimes above [`MAX_SESSION_MAX_AGE_HOURS`] are capped.
    pub fn restamp(&mut self, max_age_hours: u64) {
        let now = Utc::now();
        self.iat = now.timestamp();
        self.exp = now
            .checked_add_signed(lifetime(max_age_hours))
            .map_or(i64::MAX, |exp| exp.timestamp());
        self.jti = Uuid::new_v4().to_string();
    }

    /// Returns the user ID.
    pub fn user_id(&self) -> AuthResult<&str> {
        if self.sub.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(&self.sub)
    }

    /// Returns true if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT configuration.
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Token lifetime in hours.
    pub max_age_hours: u64,
    /// Token issuer.
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("max_age_hours", &self.max_age_hours)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    /// Creates a new JWT configuration.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            max_age_hours: DEFAULT_SESSION_MAX_AGE_HOURS,
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
        }
    }

    /// Sets the token lifetime in hours.
    pub fn with_max_age_hours(mut self, hours: u64) -> Self {
        self.max_age_hours = hours;
        self
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// Signs, validates and refreshes session tokens.
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Creates a new JWT manager.
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issues a token for a freshly signed-in identity.
    pub fn issue(&self, identity: &Identity) -> AuthResult<(String, Claims)> {
        let claims = Claims::blank(&self.config.issuer, self.config.max_age_hours);
        let claims = callbacks::on_token(claims, Some(identity));
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Validates a token and reissues it with a new expiry.
    ///
    /// The identity claims are carried over unchanged.
    pub fn refresh(&self, token: &str) -> AuthResult<(String, Claims)> {
        let claims = self.validate_token(token)?;
        let mut claims = callbacks::on_token(claims, None);
        claims.restamp(self.config.max_age_hours);
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Validates and decodes a token.
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        token_data.claims.user_id()?;

        Ok(token_data.claims)
    }

    /// Returns the token lifetime in seconds.
    pub fn max_age_seconds(&self) -> u64 {
        lifetime(self.config.max_age_hours).num_seconds().unsigned_abs()
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::JwtEncoding(e.to_string()))
    }
}
