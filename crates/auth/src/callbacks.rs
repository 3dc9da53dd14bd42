//! Token and session shaping callbacks.
//!
//! `on_token` runs whenever a token is issued or refreshed; `on_session` runs
//! whenever a session is read from a token.

use crate::{Claims, Identity, Session};

/// Copies a freshly produced identity onto the token claims.
///
/// With no identity (a refresh), the claims are returned untouched.
pub fn on_token(mut claims: Claims, identity: Option<&Identity>) -> Claims {
    if let Some(identity) = identity {
        claims.sub = identity.id.clone();
        claims.email = identity.email.clone();
        claims.name = identity.name.clone();
        claims.is_premium = identity.is_premium;
    }
    claims
}

/// Copies the token claims onto the session's user.
///
/// Sessions without a user slot are returned untouched.
pub fn on_session(mut session: Session, claims: &Claims) -> Session {
    if let Some(user) = session.user.as_mut() {
        user.id = claims.sub.clone();
        user.email = claims.email.clone();
        user.name = claims.name.clone();
        user.is_premium = claims.is_premium;
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_TOKEN_ISSUER, SessionUser};

    fn identity() -> Identity {
        Identity {
            id: "42".to_string(),
            email: "john@example.com".to_string(),
            name: Some("John".to_string()),
            is_premium: true,
        }
    }

    #[test]
    fn test_on_token_copies_identity() {
        let claims = on_token(Claims::blank(DEFAULT_TOKEN_ISSUER, 1), Some(&identity()));

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "john@example.com");
        assert_eq!(claims.name.as_deref(), Some("John"));
        assert!(claims.is_premium);
    }

    #[test]
    fn test_on_token_without_identity_is_idempotent() {
        let claims = on_token(Claims::blank(DEFAULT_TOKEN_ISSUER, 1), Some(&identity()));

        let again = on_token(claims.clone(), None);
        assert_eq!(again, claims);

        let twice = on_token(on_token(claims.clone(), None), None);
        assert_eq!(twice, claims);
    }

    #[test]
    fn test_on_session_copies_claims() {
        let claims = on_token(Claims::blank(DEFAULT_TOKEN_ISSUER, 1), Some(&identity()));
        let session = on_session(Session::empty(claims.exp), &claims);

        let user = session.user.unwrap();
        assert_eq!(
            user,
            SessionUser {
                id: "42".to_string(),
                email: "john@example.com".to_string(),
                name: Some("John".to_string()),
                is_premium: true,
            }
        );
    }

    #[test]
    fn test_on_session_is_deterministic() {
        let claims = on_token(Claims::blank(DEFAULT_TOKEN_ISSUER, 1), Some(&identity()));

        let a = on_session(Session::empty(claims.exp), &claims);
        let b = on_session(Session::empty(claims.exp), &claims);
        assert_eq!(a, b);
    }

    #[test]
    fn test_on_session_without_user_slot_is_untouched() {
        let claims = on_token(Claims::blank(DEFAULT_TOKEN_ISSUER, 1), Some(&identity()));
        let mut session = Session::empty(claims.exp);
        session.user = None;

        let projected = on_session(session.clone(), &claims);
        assert_eq!(projected, session);
    }
}
