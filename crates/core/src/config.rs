//! Builder-style configuration.

use chrono::Duration;
use std::sync::Arc;

use crate::email::EmailProvider;
use crate::error::{AuthError, AuthResult};
use crate::logger::{Logger, TracingLogger};

/// Top-level framework configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret used to sign session cookies. Must be at least 32 characters.
    pub secret: String,
    pub app_name: String,
    pub base_url: String,
    pub base_path: String,
    pub session: SessionConfig,
    pub password: PasswordConfig,
    pub email_provider: Option<Arc<dyn EmailProvider>>,
    pub logger: Arc<dyn Logger>,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            app_name: "Userhub".to_string(),
            base_url: "http://localhost:3000".to_string(),
            base_path: "/".to_string(),
            session: SessionConfig::default(),
            password: PasswordConfig::default(),
            email_provider: None,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn password(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    pub fn email_provider(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email_provider = Some(provider);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.secret.len() < 32 {
            return Err(AuthError::Configuration(
                "secret must be at least 32 characters".to_string(),
            ));
        }
        if self.password.min_length == 0 || self.password.min_length > self.password.max_length {
            return Err(AuthError::Configuration(
                "invalid password length bounds".to_string(),
            ));
        }
        if self.password.strength_threshold > 4 {
            return Err(AuthError::Configuration(
                "password strength threshold must be between 0 and 4".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub expires_in: Duration,
    /// Sessions older than this are refreshed on read.
    pub update_age: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires_in: Duration::days(7),
            update_age: Duration::days(1),
            cookie_name: "userhub.session-token".to_string(),
            cookie_secure: false,
            cookie_http_only: true,
            cookie_same_site: "Lax".to_string(),
        }
    }
}

/// Password policy knobs, consumed by `PasswordPolicy::from_config`.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Minimum strength score (0..=4) accepted at registration and reset.
    pub strength_threshold: u8,
    pub verification_token_expires_in: Duration,
    pub reset_token_expires_in: Duration,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 255,
            strength_threshold: 2,
            verification_token_expires_in: Duration::days(3),
            reset_token_expires_in: Duration::hours(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secret_is_rejected() {
        let config = AuthConfig::new("too-short");
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        let config = AuthConfig::new("an-adequately-long-test-secret-value-123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn inverted_length_bounds_are_rejected() {
        let mut config = AuthConfig::new("an-adequately-long-test-secret-value-123");
        config.password.min_length = 300;
        assert!(config.validate().is_err());
    }
}
