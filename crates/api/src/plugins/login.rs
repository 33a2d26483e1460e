//! Credential login with ordered account gates.
//!
//! After the password check the account passes through the same gate
//! sequence as [`check_user`](super::helpers::check_user), except that a
//! pending forced password change does not fail the request: it issues a
//! reset email and answers with a status payload instead of a session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use userhub_core::types::{
    AuthRequest, AuthResponse, HttpMethod, SessionResponse, StatusResponse, VerificationPurpose,
};
use userhub_core::{
    AuthContext, AuthError, AuthPlugin, AuthResult, AuthRoute, create_clear_session_cookie,
    create_session_cookie, validate_request_body, verify_password,
};

use super::helpers::{issue_verification, require_session, send_reset_email};

pub struct LoginPlugin;

impl LoginPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoginPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password: String,
}

#[async_trait]
impl AuthPlugin for LoginPlugin {
    fn name(&self) -> &'static str {
        "login"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![
            AuthRoute::new(HttpMethod::Post, "/auth/login"),
            AuthRoute::new(HttpMethod::Post, "/auth/logout"),
            AuthRoute::new(HttpMethod::Post, "/auth/logout-all"),
        ]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        match (&req.method, req.path.as_str()) {
            (HttpMethod::Post, "/auth/login") => Ok(Some(handle_login(req, ctx).await?)),
            (HttpMethod::Post, "/auth/logout") => Ok(Some(handle_logout(req, ctx).await?)),
            (HttpMethod::Post, "/auth/logout-all") => {
                Ok(Some(handle_logout_all(req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}

async fn handle_login(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    let body = req.body.as_deref().unwrap_or_default();
    let request: LoginRequest = validate_request_body(body)?;

    let user = ctx
        .store
        .get_user_by_email(&request.email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(None, &request.password, hash).await?;

    if !user.is_active {
        return Err(AuthError::AccountInactive);
    }
    if ctx.settings.require_verification() && !ctx.store.is_user_verified(&user.id).await? {
        return Err(AuthError::UserNotVerified {
            user: user.summary(),
        });
    }
    if ctx.settings.require_approval() && !user.is_approved {
        return Err(AuthError::UserNotApproved {
            user: user.summary(),
        });
    }
    if ctx.settings.require_terms_acceptance() && !user.accepted_terms {
        return Err(AuthError::TermsNotAccepted);
    }

    if user.change_password {
        let verification = issue_verification(
            ctx,
            &user,
            VerificationPurpose::ResetPassword,
            ctx.config.password.reset_token_expires_in,
        )
        .await?;
        send_reset_email(ctx, &user, &verification).await?;

        return Ok(AuthResponse::json_value(
            200,
            json!({
                "status": true,
                "detail": "Password reset e-mail has been sent.",
            }),
        ));
    }

    let ip_address = req.header("x-forwarded-for").cloned();
    let user_agent = req.header("user-agent").cloned();
    let session = ctx
        .session_manager()
        .create_session(&user, ip_address, user_agent)
        .await?;

    let signed = ctx.session_manager().sign_token(&session.token);
    let cookie = create_session_cookie(&signed, &ctx.config);

    Ok(AuthResponse::json(
        200,
        &SessionResponse {
            user,
            token: session.token,
        },
    )?
    .with_header("set-cookie", cookie))
}

async fn handle_logout(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    if let Some(token) = ctx.session_manager().extract_session_token(req) {
        ctx.session_manager().delete_session(&token).await?;
    }

    Ok(AuthResponse::json(200, &StatusResponse::ok())?
        .with_header("set-cookie", create_clear_session_cookie(&ctx.config)))
}

async fn handle_logout_all(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    let (user, _session) = require_session(req, ctx).await?;
    let revoked = ctx
        .session_manager()
        .revoke_all_user_sessions(&user.id)
        .await?;

    Ok(AuthResponse::json_value(
        200,
        json!({ "status": true, "revoked": revoked }),
    )
    .with_header("set-cookie", create_clear_session_cookie(&ctx.config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_helpers::create_test_context;
    use serde_json::json;

    fn login_request(email: &str, password: &str) -> AuthRequest {
        AuthRequest::new(HttpMethod::Post, "/auth/login")
            .with_body(&json!({ "email": email, "password": password }))
    }

    #[tokio::test]
    async fn verified_user_gets_a_session_and_cookie() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;

        let resp = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.headers["set-cookie"].contains("userhub.session-token="));

        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        let token = body["token"].as_str().unwrap();
        assert!(harness
            .ctx
            .store
            .get_session(token)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;

        let err = plugin
            .on_request(&login_request("a@example.com", "nope nope"), &harness.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unknown_email_is_indistinguishable_from_wrong_password() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();

        let err = plugin
            .on_request(&login_request("ghost@example.com", "whatever"), &harness.ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn inactive_account_reads_like_bad_credentials() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;
        harness
            .ctx
            .store
            .update_user(
                &user.id,
                userhub_core::types::UpdateUser {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn unverified_user_is_rejected_with_summary() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        harness.register_user("a@example.com", "Tr0ub4dor&3").await;

        let err = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.status, 400);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["user"]["email"], "a@example.com");
    }

    #[tokio::test]
    async fn verification_gate_can_be_disabled() {
        let harness = create_test_context();
        harness.ctx.settings.set_require_verification(false);
        let plugin = LoginPlugin::new();
        harness.register_user("a@example.com", "Tr0ub4dor&3").await;

        let resp = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn approval_gate_fires_after_verification() {
        let harness = create_test_context();
        harness.ctx.settings.set_require_approval(true);
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;

        let err = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotApproved { .. }));
    }

    #[tokio::test]
    async fn terms_gate_fires_when_enabled() {
        let harness = create_test_context();
        harness.ctx.settings.set_require_terms_acceptance(true);
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;

        let err = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TermsNotAccepted));
    }

    #[tokio::test]
    async fn forced_password_change_sends_reset_instead_of_session() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        harness.verify_user(&user).await;
        harness.set_change_password(&user, true).await;

        let resp = plugin
            .on_request(&login_request("a@example.com", "Tr0ub4dor&3"), &harness.ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status, 200);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["detail"], "Password reset e-mail has been sent.");
        assert!(body.get("token").is_none());

        let sent = harness.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("verify-reset?token=reset_"));
    }

    #[tokio::test]
    async fn logout_revokes_the_session() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        let token = harness.session_token(&user).await;

        let req = AuthRequest::new(HttpMethod::Post, "/auth/logout")
            .with_header("authorization", format!("Bearer {token}"));
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.headers["set-cookie"].contains("Expires=Thu, 01 Jan 1970"));
        assert!(harness
            .ctx
            .store
            .get_session(&token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn logout_all_revokes_every_session() {
        let harness = create_test_context();
        let plugin = LoginPlugin::new();
        let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
        let token1 = harness.session_token(&user).await;
        let _token2 = harness.session_token(&user).await;

        let req = AuthRequest::new(HttpMethod::Post, "/auth/logout-all")
            .with_header("authorization", format!("Bearer {token1}"));
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(body["revoked"], 2);
    }
}
