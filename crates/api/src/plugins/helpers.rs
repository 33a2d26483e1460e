//! Shared helpers for plugin implementations.

use chrono::Duration;
use uuid::Uuid;

use userhub_core::types::{
    AuthRequest, CreateVerification, Session, UpdateUser, User, Verification, VerificationPurpose,
};
use userhub_core::{AuthContext, AuthError, AuthResult};

/// Extract the authenticated user and session from the request.
pub async fn require_session(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<(User, Session)> {
    let session_manager = ctx.session_manager();

    if let Some(token) = session_manager.extract_session_token(req)
        && let Some(session) = session_manager.get_session(&token).await?
        && let Some(user) = ctx.store.get_user_by_id(&session.user_id).await?
    {
        return Ok((user, session));
    }

    Err(AuthError::Unauthenticated)
}

/// Ordered account gate checks, also applied at login after the password
/// check. Each gate only fires when its setting is enabled; the forced
/// password change gate always applies.
pub async fn check_user(user: &User, ctx: &AuthContext) -> AuthResult<()> {
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
        return Err(AuthError::ChangePasswordRequired);
    }
    Ok(())
}

/// `require_session` followed by the full account gate.
///
/// Used by endpoints that mutate state on behalf of the user.
pub async fn require_checked_session(
    req: &AuthRequest,
    ctx: &AuthContext,
) -> AuthResult<(User, Session)> {
    let (user, session) = require_session(req, ctx).await?;
    check_user(&user, ctx).await?;
    Ok((user, session))
}

/// Issue a fresh single-use verification token for a user and remember it
/// as the user's latest.
pub async fn issue_verification(
    ctx: &AuthContext,
    user: &User,
    purpose: VerificationPurpose,
    expires_in: Duration,
) -> AuthResult<Verification> {
    let prefix = match purpose {
        VerificationPurpose::VerifyEmail => "verify",
        VerificationPurpose::ResetPassword => "reset",
    };
    let verification = ctx
        .store
        .create_verification(CreateVerification {
            user_id: user.id.clone(),
            purpose,
            value: format!("{}_{}", prefix, Uuid::new_v4().simple()),
            expires_at: chrono::Utc::now() + expires_in,
        })
        .await?;

    ctx.store
        .update_user(
            &user.id,
            UpdateUser {
                last_verification_id: Some(Some(verification.id.clone())),
                ..Default::default()
            },
        )
        .await?;

    Ok(verification)
}

/// Send the email-verification mail. Errors propagate to the caller.
pub async fn send_verification_email(
    ctx: &AuthContext,
    user: &User,
    verification: &Verification,
) -> AuthResult<()> {
    let url = format!(
        "{}/auth/registration/verify-email?key={}",
        ctx.config.base_url, verification.value
    );
    let subject = format!("Verify your email for {}", ctx.config.app_name);
    let text = format!("Open the following link to verify your email address:\n{url}");
    ctx.email_provider()?
        .send(&user.email, &subject, "", &text)
        .await
}

/// Send the password-reset mail.
pub async fn send_reset_email(
    ctx: &AuthContext,
    user: &User,
    verification: &Verification,
) -> AuthResult<()> {
    let url = format!(
        "{}/auth/password/verify-reset?token={}",
        ctx.config.base_url, verification.value
    );
    let subject = format!("Password reset for {}", ctx.config.app_name);
    let text = format!("Open the following link to choose a new password:\n{url}");
    ctx.email_provider()?
        .send(&user.email, &subject, "", &text)
        .await
}
