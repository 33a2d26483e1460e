//! Email verification: token redemption and re-sending.

mod handlers;
mod types;

#[cfg(test)]
mod tests;

pub use types::{ResendVerificationRequest, VerifyEmailRequest};

use async_trait::async_trait;

use userhub_core::types::{AuthRequest, AuthResponse, HttpMethod};
use userhub_core::{AuthContext, AuthPlugin, AuthResult, AuthRoute};

pub struct EmailVerificationPlugin;

impl EmailVerificationPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmailVerificationPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthPlugin for EmailVerificationPlugin {
    fn name(&self) -> &'static str {
        "email-verification"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Post, "/auth/registration/verify-email"),
            AuthRoute::new(HttpMethod::Post, "/auth/send-email-verification"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        match (&req.method, req.path.as_str()) {
            (HttpMethod::Post, "/auth/registration/verify-email") => {
                Ok(Some(handlers::handle_verify_email(req, ctx).await?))
            }
            (HttpMethod::Post, "/auth/send-email-verification") => {
                Ok(Some(handlers::handle_resend_verification(req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}
