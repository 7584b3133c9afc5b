//! The authenticate predicate, injected into the supervisor at construction
//! time as `(sessionModel, sessionId) -> (sessionModel, bool)`. This crate
//! has no meaningful session state to thread through, so `SessionModel`
//! collapses to `()` — the tuple-return shape is kept so embedders with real
//! session state can swap in their own `Authenticator`.

use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};

pub type SessionModel = ();

pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, session: SessionModel, session_id: &str) -> (SessionModel, bool);
}

/// Claims carried by a session token. Only `sub`/`exp` are required; the
/// predicate does not care about the subject's value, only that the token
/// was signed with the configured secret and has not expired.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: usize,
}

/// Default `Authenticator`: verifies `sessionId` as an HS256-signed JWT
/// using the proxy's configured secret.
pub struct JwtAuthenticator {
    secret: String,
}

impl JwtAuthenticator {
    pub fn new(secret: String) -> Self {
        JwtAuthenticator { secret }
    }

    fn verify(&self, token: &str) -> Option<TokenData<SessionClaims>> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        decode::<SessionClaims>(token, &key, &Validation::new(Algorithm::HS256)).ok()
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, session: SessionModel, session_id: &str) -> (SessionModel, bool) {
        (session, self.verify(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: usize) -> String {
        let claims = SessionClaims {
            sub: "client".to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn accepts_token_signed_with_matching_secret() {
        let auth = JwtAuthenticator::new("s3cret".to_string());
        let t = token("s3cret", 9_999_999_999);
        let (_, ok) = auth.authenticate((), &t);
        assert!(ok);
    }

    #[test]
    fn rejects_token_signed_with_different_secret() {
        let auth = JwtAuthenticator::new("s3cret".to_string());
        let t = token("other", 9_999_999_999);
        let (_, ok) = auth.authenticate((), &t);
        assert!(!ok);
    }

    #[test]
    fn rejects_garbage_session_id() {
        let auth = JwtAuthenticator::new("s3cret".to_string());
        let (_, ok) = auth.authenticate((), "not-a-jwt");
        assert!(!ok);
    }
}
