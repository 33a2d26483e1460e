//! Customer organizations and the membership workflow.
//!
//! Covers reading and updating the customer record, adding and inviting
//! members, resending invitations, uninviting (with ghost-user cleanup)
//! and onboarding.

mod handlers;
mod types;


pub use handlers::{add_user, onboard, uninvite};
pub use types::{AddMemberRequest, MemberView, UpdateMemberRequest};

use async_trait::async_trait;
use chrono::Duration;

use userhub_core::types::{AuthRequest, AuthResponse, HttpMethod};
use userhub_core::{AuthContext, AuthPlugin, AuthResult, AuthRoute};

#[derive(Debug, Clone)]
pub struct CustomerConfig {
    /// How long an invitation link stays redeemable.
    pub invitation_expires_in: Duration,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            invitation_expires_in: Duration::days(7),
        }
    }
}

pub struct CustomerPlugin {
    config: CustomerConfig,
}

impl CustomerPlugin {
    pub fn new() -> Self {
        Self {
            config: CustomerConfig::default(),
        }
    }

    pub fn with_config(config: CustomerConfig) -> Self {
        Self { config }
    }
}

impl Default for CustomerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthPlugin for CustomerPlugin {
    fn name(&self) -> &'static str {
        "customer"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Get, "/customers/{id}"),
            AuthRoute::new(HttpMethod::Put, "/customers/{id}"),
            AuthRoute::new(HttpMethod::Get, "/customers/{id}/users"),
            AuthRoute::new(HttpMethod::Post, "/customers/{id}/users"),
            AuthRoute::new(HttpMethod::Get, "/customers/{id}/users/{user_id}"),
            AuthRoute::new(HttpMethod::Put, "/customers/{id}/users/{user_id}"),
            AuthRoute::new(HttpMethod::Delete, "/customers/{id}/users/{user_id}"),
            AuthRoute::new(HttpMethod::Post, "/customers/{id}/users/{user_id}/invite"),
            AuthRoute::new(HttpMethod::Post, "/customers/{id}/onboard"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        let segments = req.path_segments();
        if segments.first() != Some(&"customers") {
            return Ok(None);
        }

        let resp = match (&req.method, segments.as_slice()) {
            (HttpMethod::Get, ["customers", id]) => {
                handlers::handle_get_customer(req, ctx, id).await?
            }
            (HttpMethod::Put, ["customers", id]) => {
                handlers::handle_update_customer(req, ctx, id).await?
            }
            (HttpMethod::Get, ["customers", id, "users"]) => {
                handlers::handle_list_members(req, ctx, id).await?
            }
            (HttpMethod::Post, ["customers", id, "users"]) => {
                handlers::handle_add_member(req, ctx, id, &self.config).await?
            }
            (HttpMethod::Get, ["customers", id, "users", user_id]) => {
                handlers::handle_get_member(req, ctx, id, user_id).await?
            }
            (HttpMethod::Put, ["customers", id, "users", user_id]) => {
                handlers::handle_update_member(req, ctx, id, user_id).await?
            }
            (HttpMethod::Delete, ["customers", id, "users", user_id]) => {
                handlers::handle_remove_member(req, ctx, id, user_id).await?
            }
            (HttpMethod::Post, ["customers", id, "users", user_id, "invite"]) => {
                handlers::handle_invite(req, ctx, id, user_id, &self.config).await?
            }
            (HttpMethod::Post, ["customers", id, "onboard"]) => {
                handlers::handle_onboard(req, ctx, id).await?
            }
            _ => return Ok(None),
        };

        Ok(Some(resp))
    }
}
