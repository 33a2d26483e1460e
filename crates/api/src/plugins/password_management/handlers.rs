use userhub_core::types::{
    AuthRequest, AuthResponse, MembershipStatus, RegistrationStage, StatusResponse,
    UpdateCustomerUser, UpdateUser, User, VerificationPurpose,
};
use userhub_core::{
    AuthContext, AuthError, AuthResult, DomainEvent, PasswordInputs, hash_password,
    validate_request_body, verify_password,
};

use super::types::{ChangePasswordRequest, ResetConfirmRequest, ResetRequest};
use crate::plugins::helpers::{issue_verification, require_session, send_reset_email};

/// Issue a reset token and email it.
///
/// An unknown email still answers with a status payload so account
/// existence cannot be probed.
pub async fn handle_reset_request(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<AuthResponse> {
    let body = req.body.as_deref().unwrap_or_default();
    let request: ResetRequest = validate_request_body(body)?;

    if let Some(user) = ctx.store.get_user_by_email(&request.email).await? {
        let verification = issue_verification(
            ctx,
            &user,
            VerificationPurpose::ResetPassword,
            ctx.config.password.reset_token_expires_in,
        )
        .await?;
        send_reset_email(ctx, &user, &verification).await?;
    }

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

/// Redeem a reset token and set the new password.
///
/// Consuming the token is atomic, clears a pending forced password change,
/// revokes every session, marks the primary email verified and completes
/// onboarding when the user was parked at that stage.
pub async fn handle_reset_confirm(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<AuthResponse> {
    let body = req.body.as_deref().unwrap_or_default();
    let request: ResetConfirmRequest = validate_request_body(body)?;

    if request.new_password1 != request.new_password2 {
        return Err(AuthError::field("newPassword2", "Passwords do not match"));
    }

    let verification = ctx
        .store
        .get_verification_by_value(VerificationPurpose::ResetPassword, &request.token)
        .await?
        .ok_or(AuthError::InvalidResetToken)?;
    let user = ctx
        .store
        .get_user_by_id(&verification.user_id)
        .await?
        .ok_or(AuthError::InvalidResetToken)?;

    ctx.password_policy.check(
        &request.new_password1,
        &PasswordInputs {
            email: Some(&user.email),
            username: user.username.as_deref(),
            name: user.name.as_deref(),
        },
    )?;

    ctx.store
        .consume_verification(VerificationPurpose::ResetPassword, &request.token)
        .await?
        .ok_or(AuthError::InvalidResetToken)?;

    let hash = hash_password(None, &request.new_password1).await?;
    let user = ctx
        .store
        .update_user(
            &user.id,
            UpdateUser {
                password_hash: Some(Some(hash)),
                change_password: Some(false),
                ..Default::default()
            },
        )
        .await?;

    ctx.store.delete_user_sessions(&user.id).await?;

    // The token arrived over email, which proves address ownership.
    if let Some(email) = ctx.store.get_primary_email(&user.id).await?
        && !email.verified
    {
        ctx.store.set_email_verified(&email.id).await?;
    }

    if user.registration_stage == Some(RegistrationStage::Onboard) {
        complete_onboarding(ctx, &user).await?;
    }

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

/// Promote the user's pending memberships and clear the onboarding stage.
async fn complete_onboarding(ctx: &AuthContext, user: &User) -> AuthResult<()> {
    for membership in ctx.store.list_user_memberships(&user.id).await? {
        if membership.status != MembershipStatus::Pending {
            continue;
        }
        ctx.store
            .update_customer_user(
                &membership.id,
                UpdateCustomerUser {
                    status: Some(MembershipStatus::Active),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(customer) = ctx.store.get_customer_by_id(&membership.customer_id).await? {
            ctx.events
                .dispatch(DomainEvent::MemberOnboarded {
                    customer,
                    user: user.clone(),
                })
                .await;
        }
    }

    ctx.store
        .update_user(
            &user.id,
            UpdateUser {
                registration_stage: Some(None),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// Change the password of the authenticated user.
///
/// Requires the current password; deliberately skips the account gate so
/// that a user stuck behind a forced change can still get through.
pub async fn handle_change_password(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<AuthResponse> {
    let (user, session) = require_session(req, ctx).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let request: ChangePasswordRequest = validate_request_body(body)?;

    if request.new_password1 != request.new_password2 {
        return Err(AuthError::field("newPassword2", "Passwords do not match"));
    }

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(None, &request.current_password, hash).await?;

    ctx.password_policy.check(
        &request.new_password1,
        &PasswordInputs {
            email: Some(&user.email),
            username: user.username.as_deref(),
            name: user.name.as_deref(),
        },
    )?;

    let new_hash = hash_password(None, &request.new_password1).await?;
    ctx.store
        .update_user(
            &user.id,
            UpdateUser {
                password_hash: Some(Some(new_hash)),
                change_password: Some(false),
                ..Default::default()
            },
        )
        .await?;

    if request.revoke_other_sessions {
        ctx.store
            .delete_other_user_sessions(&user.id, &session.token)
            .await?;
    }

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}
