//! Session view exposed to application code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Claims, callbacks};

/// The signed-in user as seen by application code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// User ID.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Premium flag.
    pub is_premium: bool,
}

/// Per-request session derived from a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The signed-in user, if the session carries one.
    pub user: Option<SessionUser>,
    /// When the backing token expires.
    pub expires: DateTime<Utc>,
}

impl Session {
    /// Creates a session with an empty user slot expiring at `exp` (seconds
    /// since the Unix epoch). Out-of-range values saturate.
    pub fn empty(exp: i64) -> Self {
        let expires = DateTime::from_timestamp(exp, 0).unwrap_or(if exp < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        Self {
            user: Some(SessionUser::default()),
            expires,
        }
    }

    /// Builds the session for a validated token.
    pub fn from_claims(claims: &Claims) -> Self {
        callbacks::on_session(Self::empty(claims.exp), claims)
    }
}
