//! Server-side session state for the login flow.
//!
//! The session cookie only carries a signed session id; the verified
//! [`Identity`] lives in the session store. The provider's access token is
//! handed to the browser in a separate HTTP-only cookie.

use crate::config::Session as SessionConfig;
use crate::error::AuthError;
use crate::session_store::MokaSessionStore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Cookie, Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, Session, SessionManagerLayer};

pub const IDENTITY_KEY: &str = "identity";
pub const TOKEN_COOKIE: &str = "access_token";

pub type SessionLayer = SessionManagerLayer<MokaSessionStore, SignedCookie>;

/// The claims of an authenticated user, as verified by the identity provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub claims: Map<String, Value>,
}

impl Identity {
    pub fn from_claims(claims: Map<String, Value>, username_claim: &str) -> Result<Self, AuthError> {
        let username = match claims.get(username_claim) {
            Some(Value::String(username)) if !username.is_empty() => username.clone(),
            _ => return Err(AuthError::MissingClaim(username_claim.to_string())),
        };
        Ok(Identity { username, claims })
    }

    /// Primary key of the user's item in the per-user store.
    pub fn lookup_key(&self) -> String {
        self.username.to_uppercase()
    }
}

pub fn session_layer(config: &SessionConfig) -> SessionLayer {
    // SHA-512 yields exactly the 64 bytes a signing key needs.
    let digest = Sha512::digest(config.secret_key.expose_secret().as_bytes());
    let key = Key::from(digest.as_slice());
    let inactivity = i64::try_from(config.inactivity_timeout_secs).unwrap_or(i64::MAX);

    SessionManagerLayer::new(MokaSessionStore::new(config.max_sessions))
        .with_name(config.cookie_name.clone())
        .with_http_only(true)
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_path("/")
        .with_expiry(Expiry::OnInactivity(Duration::seconds(inactivity)))
        .with_signed(key)
}

pub async fn current_identity(session: &Session) -> Result<Option<Identity>, AuthError> {
    Ok(session.get::<Identity>(IDENTITY_KEY).await?)
}

/// Stores `identity` under a fresh session id.
pub async fn establish(session: &Session, identity: &Identity) -> Result<(), AuthError> {
    session.cycle_id().await?;
    session.insert(IDENTITY_KEY, identity).await?;
    Ok(())
}

pub async fn clear(session: &Session) -> Result<(), AuthError> {
    session.flush().await?;
    Ok(())
}

pub fn token_cookie(token: &str, secure: bool) -> String {
    Cookie::build((TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
        .to_string()
}

pub fn clear_token_cookie(secure: bool) -> String {
    let mut cookie = Cookie::build((TOKEN_COOKIE, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_identity_from_claims() {
        let identity =
            Identity::from_claims(claims(json!({"username": "alice", "email": "a@x"})), "username")
                .unwrap();

        assert_eq!(identity.username, "alice");
        assert_eq!(identity.lookup_key(), "ALICE");
        assert_eq!(identity.claims["email"], json!("a@x"));
    }

    #[test]
    fn test_missing_username_claim() {
        for value in [json!({}), json!({"username": ""}), json!({"username": 7})] {
            let err = Identity::from_claims(claims(value), "username").unwrap_err();
            assert!(matches!(err, AuthError::MissingClaim(ref c) if c == "username"));
        }
    }

    #[test]
    fn test_token_cookies() {
        let set = token_cookie("tok", true);
        assert!(set.starts_with("access_token=tok"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Secure"));

        let cleared = clear_token_cookie(false);
        assert!(cleared.starts_with("access_token=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }
}
