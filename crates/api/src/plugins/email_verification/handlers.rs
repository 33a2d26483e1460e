use chrono::Utc;

use userhub_core::types::{
    AuthRequest, AuthResponse, MembershipStatus, RegistrationStage, StatusResponse,
    UpdateCustomerUser, UpdateUser, User, VerificationPurpose,
};
use userhub_core::{AuthContext, AuthError, AuthResult, DomainEvent, validate_request_body};

use super::types::{ResendVerificationRequest, VerifyEmailRequest};
use crate::plugins::helpers::{issue_verification, send_verification_email};

/// Redeem a verification key.
///
/// Marks the primary email verified, promotes the user's pending
/// memberships and clears a verification-pending registration stage.
/// Re-verifying an already-verified user succeeds without side effects.
pub async fn handle_verify_email(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<AuthResponse> {
    let body = req.body.as_deref().unwrap_or_default();
    let request: VerifyEmailRequest = validate_request_body(body)?;

    let verification = ctx
        .store
        .get_verification_by_value(VerificationPurpose::VerifyEmail, &request.key)
        .await?
        .ok_or(AuthError::InvalidVerificationKey)?;
    let user = ctx
        .store
        .get_user_by_id(&verification.user_id)
        .await?
        .ok_or(AuthError::InvalidVerificationKey)?;

    if ctx.store.is_user_verified(&user.id).await? {
        return Ok(AuthResponse::json(200, &StatusResponse::ok())?);
    }

    if !verification.is_usable(Utc::now()) {
        return Err(AuthError::InvalidVerificationKey);
    }
    ctx.store
        .consume_verification(VerificationPurpose::VerifyEmail, &request.key)
        .await?
        .ok_or(AuthError::InvalidVerificationKey)?;

    let email = ctx
        .store
        .get_primary_email(&user.id)
        .await?
        .ok_or_else(|| AuthError::internal("user has no primary email address"))?;
    ctx.store.set_email_verified(&email.id).await?;

    promote_pending_memberships(ctx, &user).await?;

    let user = if matches!(
        user.registration_stage,
        Some(RegistrationStage::Customer) | Some(RegistrationStage::CustomerUser)
    ) {
        ctx.store
            .update_user(
                &user.id,
                UpdateUser {
                    registration_stage: Some(None),
                    ..Default::default()
                },
            )
            .await?
    } else {
        user
    };

    ctx.events
        .dispatch(DomainEvent::UserVerified { user })
        .await;

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

async fn promote_pending_memberships(ctx: &AuthContext, user: &User) -> AuthResult<()> {
    for membership in ctx.store.list_user_memberships(&user.id).await? {
        if membership.status == MembershipStatus::Pending {
            ctx.store
                .update_customer_user(
                    &membership.id,
                    UpdateCustomerUser {
                        status: Some(MembershipStatus::Active),
                        ..Default::default()
                    },
                )
                .await?;
        }
    }
    Ok(())
}

/// Re-send the verification email.
///
/// Answers with a status payload whether or not the email matches an
/// account, and only actually sends for unverified users.
pub async fn handle_resend_verification(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<AuthResponse> {
    let body = req.body.as_deref().unwrap_or_default();
    let request: ResendVerificationRequest = validate_request_body(body)?;

    if let Some(user) = ctx.store.get_user_by_email(&request.email).await?
        && !ctx.store.is_user_verified(&user.id).await?
    {
        let verification = issue_verification(
            ctx,
            &user,
            VerificationPurpose::VerifyEmail,
            ctx.config.password.verification_token_expires_in,
        )
        .await?;
        send_verification_email(ctx, &user, &verification).await?;
    }

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}
