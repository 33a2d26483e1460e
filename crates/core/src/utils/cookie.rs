//! Shared cookie helpers used across plugins.
//!
//! Centralises the `Set-Cookie` header construction so that each plugin
//! does not duplicate the same formatting logic.

use crate::config::{AuthConfig, SessionConfig};

/// Build a `Set-Cookie` header value for a signed session token.
pub fn create_session_cookie(signed_token: &str, config: &AuthConfig) -> String {
    let session_config = &config.session;
    let attrs = cookie_attributes(session_config);

    let expires = chrono::Utc::now() + session_config.expires_in;
    let expires_str = expires.format("%a, %d %b %Y %H:%M:%S GMT");

    format!(
        "{}={}; Path=/; Expires={}{}",
        session_config.cookie_name, signed_token, expires_str, attrs
    )
}

/// Build a `Set-Cookie` header that clears (expires) the session cookie.
pub fn create_clear_session_cookie(config: &AuthConfig) -> String {
    let session_config = &config.session;
    let attrs = cookie_attributes(session_config);

    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
        session_config.cookie_name, attrs
    )
}

fn cookie_attributes(session_config: &SessionConfig) -> String {
    let secure = if session_config.cookie_secure {
        "; Secure"
    } else {
        ""
    };
    let http_only = if session_config.cookie_http_only {
        "; HttpOnly"
    } else {
        ""
    };

    format!(
        "{}{}; SameSite={}",
        secure, http_only, session_config.cookie_same_site
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_carries_attributes() {
        let config = AuthConfig::new("an-adequately-long-test-secret-value-123");
        let cookie = create_session_cookie("tok.sig", &config);
        assert!(cookie.starts_with("userhub.session-token=tok.sig; Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn clear_cookie_expires_in_the_past() {
        let config = AuthConfig::new("an-adequately-long-test-secret-value-123");
        let cookie = create_clear_session_cookie(&config);
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
    }
}
