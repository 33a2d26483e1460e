//! Session creation, validation and cookie signing.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::IdentityStore;
use crate::config::AuthConfig;
use crate::error::AuthResult;
use crate::types::{AuthRequest, CreateSession, Session, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SessionManager {
    config: Arc<AuthConfig>,
    store: Arc<dyn IdentityStore>,
}

impl SessionManager {
    pub fn new(config: Arc<AuthConfig>, store: Arc<dyn IdentityStore>) -> Self {
        Self { config, store }
    }

    /// Create a new session for a user.
    pub async fn create_session(
        &self,
        user: &User,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AuthResult<Session> {
        let token = format!("session_{}", Uuid::new_v4().simple());
        let expires_at = Utc::now() + self.config.session.expires_in;

        self.store
            .create_session(CreateSession {
                token,
                user_id: user.id.clone(),
                expires_at,
                ip_address,
                user_agent,
            })
            .await
    }

    /// Look up a session by raw token, dropping it when expired.
    ///
    /// Sessions older than `update_age` have their expiry pushed forward,
    /// giving sliding expiration.
    pub async fn get_session(&self, token: &str) -> AuthResult<Option<Session>> {
        let session = self.store.get_session(token).await?;

        if let Some(ref session) = session {
            let now = Utc::now();
            if session.expires_at < now {
                self.store.delete_session(token).await?;
                return Ok(None);
            }

            let refresh_after = session.updated_at + self.config.session.update_age;
            if now > refresh_after {
                let new_expires_at = now + self.config.session.expires_in;
                let _ = self.store.update_session_expiry(token, new_expires_at).await;
            }
        }

        Ok(session)
    }

    pub async fn delete_session(&self, token: &str) -> AuthResult<()> {
        self.store.delete_session(token).await
    }

    /// Revoke every session of a user, returning how many were dropped.
    pub async fn revoke_all_user_sessions(&self, user_id: &str) -> AuthResult<u64> {
        self.store.delete_user_sessions(user_id).await
    }

    pub async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        self.store.delete_expired_sessions().await
    }

    /// Sign a session token with HMAC-SHA256 using the config secret.
    ///
    /// Returns the signed value in the format `token.base64url_signature`.
    pub fn sign_token(&self, token: &str) -> String {
        sign_session_token(token, &self.config.secret)
    }

    /// Verify an HMAC-signed cookie value and extract the raw token.
    pub fn verify_signed_token(&self, signed_value: &str) -> Option<String> {
        verify_and_extract_token(signed_value, &self.config.secret)
    }

    /// Extract session token from a request.
    ///
    /// Tries Bearer token from the Authorization header first (no HMAC,
    /// for API clients), then falls back to the configured cookie with
    /// signature verification.
    pub fn extract_session_token(&self, req: &AuthRequest) -> Option<String> {
        if let Some(auth_header) = req.headers.get("authorization")
            && let Some(token) = auth_header.strip_prefix("Bearer ")
        {
            return Some(token.to_string());
        }

        if let Some(cookie_header) = req.headers.get("cookie") {
            let cookie_name = &self.config.session.cookie_name;
            for part in cookie_header.split(';') {
                let part = part.trim();
                if let Some(value) = part.strip_prefix(&format!("{}=", cookie_name))
                    && !value.is_empty()
                {
                    return self.verify_signed_token(value);
                }
            }
        }

        None
    }
}

fn compute_hmac_signature(token: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    let result = mac.finalize();
    URL_SAFE_NO_PAD.encode(result.into_bytes())
}

/// Sign a session token with HMAC-SHA256.
pub fn sign_session_token(token: &str, secret: &str) -> String {
    let signature = compute_hmac_signature(token, secret);
    format!("{}.{}", token, signature)
}

/// Verify an HMAC-signed value and extract the raw token.
fn verify_and_extract_token(signed_value: &str, secret: &str) -> Option<String> {
    let (token, signature) = signed_value.rsplit_once('.')?;
    if token.is_empty() || signature.is_empty() {
        return None;
    }

    let expected_signature = compute_hmac_signature(token, secret);

    // Constant-time comparison to prevent timing attacks
    if signature.len() != expected_signature.len() {
        return None;
    }
    let diff = signature
        .as_bytes()
        .iter()
        .zip(expected_signature.as_bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff != 0 {
        return None;
    }

    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::types::{CreateUser, HttpMethod};

    const SECRET: &str = "an-adequately-long-test-secret-value-123";

    fn manager() -> SessionManager {
        let config = Arc::new(AuthConfig::new(SECRET));
        SessionManager::new(config, Arc::new(MemoryStore::new()))
    }

    #[test]
    fn signed_token_round_trip() {
        let mgr = manager();
        let signed = mgr.sign_token("session_abc");
        assert_eq!(mgr.verify_signed_token(&signed).as_deref(), Some("session_abc"));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let mgr = manager();
        let mut signed = mgr.sign_token("session_abc");
        signed.push('x');
        assert!(mgr.verify_signed_token(&signed).is_none());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mgr = manager();
        let req = AuthRequest::new(HttpMethod::Get, "/users/current")
            .with_header("authorization", "Bearer session_bearer")
            .with_header("cookie", format!(
                "userhub.session-token={}",
                mgr.sign_token("session_cookie")
            ));
        assert_eq!(mgr.extract_session_token(&req).as_deref(), Some("session_bearer"));
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped_on_read() {
        let store = Arc::new(MemoryStore::new());
        let mut config = AuthConfig::new(SECRET);
        config.session.expires_in = chrono::Duration::seconds(-1);
        let mgr = SessionManager::new(Arc::new(config), store.clone());

        let user = store
            .create_user(CreateUser::new("alice@example.com"))
            .await
            .unwrap();
        let session = mgr.create_session(&user, None, None).await.unwrap();

        assert!(mgr.get_session(&session.token).await.unwrap().is_none());
        assert!(store.get_session(&session.token).await.unwrap().is_none());
    }
}
