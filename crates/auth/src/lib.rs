//! Authentication for Authgate.
//!
//! This crate provides:
//! - Email/password sign-in against an optional user store
//! - Federated sign-in (Google) with PKCE and single-use state
//! - Stateless JWT sessions and the token/session shaping callbacks
//! - Settings loaded from the environment

mod authenticator;
pub mod callbacks;
mod config;
mod credentials;
mod error;
mod federated;
mod google;
mod jwt;
mod password;
mod session;
mod state_store;

pub use authenticator::*;
pub use config::*;
pub use credentials::*;
pub use error::*;
pub use federated::*;
pub use google::*;
pub use jwt::*;
pub use password::*;
pub use session::*;
pub use state_store::*;

/// Default session lifetime in hours (30 days).
pub const DEFAULT_SESSION_MAX_AGE_HOURS: u64 = 720;

/// Default token issuer.
pub const DEFAULT_TOKEN_ISSUER: &str = "authgate";

/// Longest accepted session lifetime in hours (10 years).
pub const MAX_SESSION_MAX_AGE_HOURS: u64 = 87_600;
