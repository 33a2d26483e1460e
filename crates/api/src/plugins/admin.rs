//! Admin surface: runtime settings and account approval.
//!
//! Every route is gated twice: the `enable_backend_access` settings toggle
//! must be on, and the caller must be an admin.

use async_trait::async_trait;

use userhub_core::types::{AuthRequest, AuthResponse, HttpMethod, UpdateUser, User};
use userhub_core::{
    AuthContext, AuthError, AuthPlugin, AuthResult, AuthRoute, DomainEvent, SettingsUpdate,
};

use crate::plugins::helpers::require_checked_session;

pub struct AdminPlugin;

impl AdminPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AdminPlugin {
    fn default() -> Self {
        Self::new()
    }
}

async fn require_admin(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<User> {
    if !ctx.settings.enable_backend_access() {
        return Err(AuthError::BackendAccessDisabled);
    }
    let (user, _) = require_checked_session(req, ctx).await?;
    if !user.is_admin {
        return Err(AuthError::forbidden("Insufficient permissions"));
    }
    Ok(user)
}

async fn handle_get_settings(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    require_admin(req, ctx).await?;
    Ok(AuthResponse::json(200, &ctx.settings.snapshot())?)
}

async fn handle_update_settings(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    require_admin(req, ctx).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let update: SettingsUpdate = serde_json::from_slice(body)
        .map_err(|e| AuthError::validation(format!("Invalid request body: {e}")))?;
    ctx.settings.apply(&update);

    Ok(AuthResponse::json(200, &ctx.settings.snapshot())?)
}

async fn handle_approve_user(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    require_admin(req, ctx).await?;

    let user = ctx
        .store
        .get_user_by_id(id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if user.is_approved {
        return Ok(AuthResponse::json(200, &user)?);
    }

    let user = ctx
        .store
        .update_user(
            id,
            UpdateUser {
                is_approved: Some(true),
                ..Default::default()
            },
        )
        .await?;
    ctx.events
        .dispatch(DomainEvent::UserApproved { user: user.clone() })
        .await;

    Ok(AuthResponse::json(200, &user)?)
}

#[async_trait]
impl AuthPlugin for AdminPlugin {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Get, "/admin/settings"),
            AuthRoute::new(HttpMethod::Put, "/admin/settings"),
            AuthRoute::new(HttpMethod::Post, "/admin/users/{id}/approve"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        let segments = req.path_segments();
        let resp = match (&req.method, segments.as_slice()) {
            (HttpMethod::Get, ["admin", "settings"]) => handle_get_settings(req, ctx).await?,
            (HttpMethod::Put, ["admin", "settings"]) => handle_update_settings(req, ctx).await?,
            (HttpMethod::Post, ["admin", "users", id, "approve"]) => {
                handle_approve_user(req, ctx, id).await?
            }
            _ => return Ok(None),
        };
        Ok(Some(resp))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::plugins::test_helpers::create_test_context;

    fn authed(req: AuthRequest, token: &str) -> AuthRequest {
        req.with_header("authorization", format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn backend_access_is_off_by_default() {
        let harness = create_test_context();
        let plugin = AdminPlugin::new();
        let admin = harness.register_admin("admin@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&admin).await;

        let req = authed(AuthRequest::new(HttpMethod::Get, "/admin/settings"), &token);
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::BackendAccessDisabled));
    }

    #[tokio::test]
    async fn non_admins_are_rejected() {
        let harness = create_test_context();
        harness.ctx.settings.set_enable_backend_access(true);
        let plugin = AdminPlugin::new();
        let user = harness.register_user("user@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;
        let token = harness.session_token(&user).await;

        let req = authed(AuthRequest::new(HttpMethod::Get, "/admin/settings"), &token);
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)));
    }

    #[tokio::test]
    async fn settings_update_takes_effect_immediately() {
        let harness = create_test_context();
        harness.ctx.settings.set_enable_backend_access(true);
        let plugin = AdminPlugin::new();
        let admin = harness.register_admin("admin@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&admin).await;

        let req = authed(
            AuthRequest::new(HttpMethod::Put, "/admin/settings")
                .with_body(&json!({ "requireApproval": true })),
            &token,
        );
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        assert_eq!(resp.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["requireApproval"], true);
        assert!(harness.ctx.settings.require_approval());
        // Untouched toggles keep their values.
        assert!(harness.ctx.settings.allow_registration());
    }

    #[tokio::test]
    async fn password_bounds_adjust_at_runtime() {
        let harness = create_test_context();
        harness.ctx.settings.set_enable_backend_access(true);
        let plugin = AdminPlugin::new();
        let registration = crate::plugins::RegistrationPlugin::new();
        let admin = harness.register_admin("admin@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&admin).await;

        let register = AuthRequest::new(HttpMethod::Post, "/auth/register").with_body(&json!({
            "email": "short@example.com",
            "password1": "ab1!x",
            "password2": "ab1!x",
        }));
        let err = registration
            .on_request(&register, &harness.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooShort { min: 8 }));

        let req = authed(
            AuthRequest::new(HttpMethod::Put, "/admin/settings").with_body(&json!({
                "passwordMinLength": 4,
                "passwordStrengthThreshold": 0,
            })),
            &token,
        );
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["passwordMinLength"], 4);

        let resp = registration
            .on_request(&register, &harness.ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn approval_notifies_the_user() {
        let harness = create_test_context();
        harness.ctx.settings.set_enable_backend_access(true);
        let plugin = AdminPlugin::new();
        let admin = harness.register_admin("admin@example.com", "Tr0ub4dor&3").await;
        let user = harness.register_user("new@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&admin).await;

        let req = authed(
            AuthRequest::new(
                HttpMethod::Post,
                format!("/admin/users/{}/approve", user.id),
            ),
            &token,
        );
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        assert_eq!(resp.status, 200);

        let user = harness
            .ctx
            .store
            .get_user_by_id(&user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_approved);

        let inbox = harness.ctx.store.list_messages(&user.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn approving_twice_does_not_renotify() {
        let harness = create_test_context();
        harness.ctx.settings.set_enable_backend_access(true);
        let plugin = AdminPlugin::new();
        let admin = harness.register_admin("admin@example.com", "Tr0ub4dor&3").await;
        let user = harness.register_user("new@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&admin).await;

        for _ in 0..2 {
            let req = authed(
                AuthRequest::new(
                    HttpMethod::Post,
                    format!("/admin/users/{}/approve", user.id),
                ),
                &token,
            );
            plugin.on_request(&req, &harness.ctx).await.unwrap();
        }

        let inbox = harness.ctx.store.list_messages(&user.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
    }
}
