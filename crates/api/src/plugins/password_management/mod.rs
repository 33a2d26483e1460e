//! Password reset and change flows.

mod handlers;
mod types;


pub use types::{ChangePasswordRequest, ResetConfirmRequest, ResetRequest};

use async_trait::async_trait;

use userhub_core::types::{AuthRequest, AuthResponse, HttpMethod};
use userhub_core::{AuthContext, AuthPlugin, AuthResult, AuthRoute};

pub struct PasswordManagementPlugin;

impl PasswordManagementPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PasswordManagementPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthPlugin for PasswordManagementPlugin {
    fn name(&self) -> &'static str {
        "password-management"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Post, "/auth/password/reset"),
            AuthRoute::new(HttpMethod::Post, "/auth/password/verify-reset"),
            AuthRoute::new(HttpMethod::Post, "/auth/password/change"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        match (&req.method, req.path.as_str()) {
            (HttpMethod::Post, "/auth/password/reset") => {
                Ok(Some(handlers::handle_reset_request(req, ctx).await?))
            }
            (HttpMethod::Post, "/auth/password/verify-reset") => {
                Ok(Some(handlers::handle_reset_confirm(req, ctx).await?))
            }
            (HttpMethod::Post, "/auth/password/change") => {
                Ok(Some(handlers::handle_change_password(req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}
