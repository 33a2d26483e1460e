//! Plugin trait and shared request context.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::IdentityStore;
use crate::config::AuthConfig;
use crate::email::EmailProvider;
use crate::error::{AuthError, AuthResult};
use crate::events::EventBus;
use crate::policy::PasswordPolicy;
use crate::profile::ProfileRegistry;
use crate::session::SessionManager;
use crate::settings::UserSettings;
use crate::types::{AuthRequest, AuthResponse, HttpMethod};

/// A route exposed by a plugin. Paths may contain `{param}` segments.
#[derive(Debug, Clone)]
pub struct AuthRoute {
    pub path: String,
    pub method: HttpMethod,
}

impl AuthRoute {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

/// Context passed to plugin methods.
pub struct AuthContext {
    pub config: Arc<AuthConfig>,
    pub settings: Arc<UserSettings>,
    pub store: Arc<dyn IdentityStore>,
    pub events: Arc<EventBus>,
    pub profiles: Arc<ProfileRegistry>,
    pub password_policy: Arc<PasswordPolicy>,
    session_manager: SessionManager,
}

impl AuthContext {
    pub fn new(
        config: Arc<AuthConfig>,
        settings: Arc<UserSettings>,
        store: Arc<dyn IdentityStore>,
        events: Arc<EventBus>,
        profiles: Arc<ProfileRegistry>,
    ) -> Self {
        let session_manager = SessionManager::new(config.clone(), store.clone());
        // Config supplies the boot values; admins can adjust them at runtime.
        settings.set_password_min_length(config.password.min_length);
        settings.set_password_max_length(config.password.max_length);
        settings.set_password_strength_threshold(config.password.strength_threshold);
        let password_policy = Arc::new(PasswordPolicy::from_settings(&settings));
        Self {
            config,
            settings,
            store,
            events,
            profiles,
            password_policy,
            session_manager,
        }
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.session_manager
    }

    /// The configured email provider, or a configuration error when absent.
    pub fn email_provider(&self) -> AuthResult<&Arc<dyn EmailProvider>> {
        self.config
            .email_provider
            .as_ref()
            .ok_or_else(|| AuthError::Configuration("no email provider configured".to_string()))
    }
}

#[async_trait]
pub trait AuthPlugin: Send + Sync {
    /// Plugin name - should be unique.
    fn name(&self) -> &'static str;

    /// Routes that this plugin handles.
    fn routes(&self) -> Vec<AuthRoute>;

    /// Called once when the framework is built.
    async fn on_init(&self, ctx: &AuthContext) -> AuthResult<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called for each request - return `Some(response)` to handle,
    /// `None` to pass through.
    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>>;
}
