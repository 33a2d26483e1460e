use userhub_core::types::{
    AuthRequest, AuthResponse, CreateCustomerUser, CreateEmailAddress, CreateUser, Customer,
    CustomerKind, CustomerUser, MembershipKind, MembershipStatus, RegistrationStage, StatusResponse,
    UpdateCustomer, UpdateCustomerUser, User, VerificationPurpose,
};
use userhub_core::{AuthContext, AuthError, AuthResult, DomainEvent, validate_request_body};

use super::CustomerConfig;
use super::types::{AddMemberRequest, MemberView, UpdateMemberRequest};
use crate::authz::{MembershipAction, MembershipPolicy, RegistrationStagePolicy};
use crate::plugins::helpers::{issue_verification, require_checked_session, require_session};

async fn load_customer(ctx: &AuthContext, id: &str) -> AuthResult<Customer> {
    ctx.store
        .get_customer_by_id(id)
        .await?
        .ok_or_else(|| AuthError::not_found("Customer not found"))
}

/// Resolve the actor's membership and check it against the policy.
async fn require_actor_membership(
    ctx: &AuthContext,
    customer_id: &str,
    actor: &User,
    action: MembershipAction,
) -> AuthResult<CustomerUser> {
    let membership = ctx.store.get_customer_user(customer_id, &actor.id).await?;
    match membership {
        Some(m) if MembershipPolicy::authorize(Some(&m), action) => Ok(m),
        _ => Err(AuthError::forbidden("Insufficient permissions")),
    }
}

async fn member_view(ctx: &AuthContext, membership: CustomerUser) -> AuthResult<MemberView> {
    let user = ctx
        .store
        .get_user_by_id(&membership.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(MemberView {
        membership,
        user: user.summary(),
    })
}

// ---------------------------------------------------------------------------
// Workflow operations, shared between handlers and the host application
// ---------------------------------------------------------------------------

/// Idempotently attach a user to a customer.
///
/// Returns the existing membership untouched when one is present,
/// otherwise creates it and announces the new member.
pub async fn add_user(
    ctx: &AuthContext,
    customer: &Customer,
    user: &User,
    kind: MembershipKind,
    status: MembershipStatus,
) -> AuthResult<CustomerUser> {
    if let Some(existing) = ctx.store.get_customer_user(&customer.id, &user.id).await? {
        return Ok(existing);
    }
    if customer.kind == CustomerKind::Single
        && !ctx.store.list_customer_users(&customer.id).await?.is_empty()
    {
        return Err(AuthError::conflict(
            "A personal customer can only have one member",
        ));
    }

    let membership = ctx
        .store
        .create_customer_user(CreateCustomerUser {
            customer_id: customer.id.clone(),
            user_id: user.id.clone(),
            kind,
            status,
        })
        .await?;

    ctx.events
        .dispatch(DomainEvent::CustomerGainedMember {
            customer: customer.clone(),
            user: user.clone(),
            membership: membership.clone(),
        })
        .await;

    Ok(membership)
}

/// Remove a membership; purges the user record too when it was a ghost
/// (invited, never set a password) with no remaining memberships.
pub async fn uninvite(
    ctx: &AuthContext,
    customer: &Customer,
    actor: &User,
    target: &User,
) -> AuthResult<()> {
    if actor.id == target.id {
        return Err(AuthError::CannotRemoveSelf);
    }

    let membership = ctx
        .store
        .get_customer_user(&customer.id, &target.id)
        .await?
        .ok_or_else(|| AuthError::not_found("Membership not found"))?;
    ctx.store.delete_customer_user(&membership.id).await?;

    if !target.has_password()
        && ctx.store.list_user_memberships(&target.id).await?.is_empty()
    {
        ctx.store.delete_user(&target.id).await?;
    }

    Ok(())
}

/// Transition the user's pending membership to active.
pub async fn onboard(
    ctx: &AuthContext,
    customer: &Customer,
    user: &User,
) -> AuthResult<CustomerUser> {
    let membership = ctx
        .store
        .get_customer_user(&customer.id, &user.id)
        .await?
        .ok_or_else(|| AuthError::not_found("Membership not found"))?;

    if membership.status == MembershipStatus::Active {
        return Ok(membership);
    }

    let membership = ctx
        .store
        .update_customer_user(
            &membership.id,
            UpdateCustomerUser {
                status: Some(MembershipStatus::Active),
                ..Default::default()
            },
        )
        .await?;

    ctx.events
        .dispatch(DomainEvent::MemberOnboarded {
            customer: customer.clone(),
            user: user.clone(),
        })
        .await;

    Ok(membership)
}

async fn send_invitation_email(
    ctx: &AuthContext,
    customer: &Customer,
    target: &User,
    config: &CustomerConfig,
) -> AuthResult<()> {
    let subject = format!("You have been invited to {}", customer.name);

    let text = if target.has_password() {
        format!(
            "You have been added to {} on {}. Sign in at {} to accept.",
            customer.name, ctx.config.app_name, ctx.config.base_url
        )
    } else {
        let verification = issue_verification(
            ctx,
            target,
            VerificationPurpose::ResetPassword,
            config.invitation_expires_in,
        )
        .await?;
        format!(
            "You have been invited to {} on {}. Set your password to get started:\n{}/auth/password/verify-reset?token={}",
            customer.name, ctx.config.app_name, ctx.config.base_url, verification.value
        )
    };

    ctx.email_provider()?
        .send(&target.email, &subject, "", &text)
        .await
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

pub(super) async fn handle_get_customer(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Read).await?;

    Ok(AuthResponse::json(200, &customer)?)
}

pub(super) async fn handle_update_customer(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Manage).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let update: UpdateCustomer = serde_json::from_slice(body)
        .map_err(|e| AuthError::validation(format!("Invalid request body: {e}")))?;
    let customer = ctx.store.update_customer(&customer.id, update).await?;

    Ok(AuthResponse::json(200, &customer)?)
}

pub(super) async fn handle_list_members(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Read).await?;

    let mut members = Vec::new();
    for membership in ctx.store.list_customer_users(&customer.id).await? {
        members.push(member_view(ctx, membership).await?);
    }

    Ok(AuthResponse::json(200, &members)?)
}

pub(super) async fn handle_get_member(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
    user_id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Read).await?;

    let membership = ctx
        .store
        .get_customer_user(&customer.id, user_id)
        .await?
        .ok_or_else(|| AuthError::not_found("Membership not found"))?;

    Ok(AuthResponse::json(200, &member_view(ctx, membership).await?)?)
}

pub(super) async fn handle_add_member(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
    config: &CustomerConfig,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let request: AddMemberRequest = validate_request_body(body)?;

    // A registrant parked at the membership stage may create exactly their
    // own first membership; everyone else needs an active manager role.
    let bootstrap = RegistrationStagePolicy::may_bootstrap_membership(&actor, &request.email);
    if !bootstrap {
        require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Manage).await?;
    }

    let target = match ctx.store.get_user_by_email(&request.email).await? {
        Some(user) => user,
        None => {
            let user = ctx
                .store
                .create_user(
                    CreateUser::new(&request.email).with_stage(RegistrationStage::Onboard),
                )
                .await?;
            ctx.store
                .create_email_address(CreateEmailAddress {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    primary: true,
                    verified: false,
                })
                .await?;
            user
        }
    };

    let kind = if bootstrap {
        MembershipKind::Manager
    } else {
        request.kind.unwrap_or(MembershipKind::Member)
    };
    let membership = add_user(ctx, &customer, &target, kind, MembershipStatus::Pending).await?;

    if !bootstrap {
        if let Err(e) = send_invitation_email(ctx, &customer, &target, config).await {
            tracing::warn!(user = %target.id, error = %e, "failed to send invitation email");
        }
    }

    Ok(AuthResponse::json(200, &member_view(ctx, membership).await?)?)
}

pub(super) async fn handle_update_member(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
    user_id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Manage).await?;

    let body = req.body.as_deref().unwrap_or_default();
    let request: UpdateMemberRequest = validate_request_body(body)?;

    let membership = ctx
        .store
        .get_customer_user(&customer.id, user_id)
        .await?
        .ok_or_else(|| AuthError::not_found("Membership not found"))?;

    if membership.kind == request.kind {
        return Ok(AuthResponse::json(200, &member_view(ctx, membership).await?)?);
    }

    let membership = ctx
        .store
        .update_customer_user(
            &membership.id,
            UpdateCustomerUser {
                kind: Some(request.kind),
                ..Default::default()
            },
        )
        .await?;

    let target = ctx
        .store
        .get_user_by_id(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let event = match request.kind {
        MembershipKind::Manager => DomainEvent::ManagerGranted {
            customer: customer.clone(),
            user: target,
        },
        MembershipKind::Member => DomainEvent::ManagerRevoked {
            customer: customer.clone(),
            user: target,
        },
    };
    ctx.events.dispatch(event).await;

    Ok(AuthResponse::json(200, &member_view(ctx, membership).await?)?)
}

pub(super) async fn handle_remove_member(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
    user_id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Manage).await?;

    let target = ctx
        .store
        .get_user_by_id(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    uninvite(ctx, &customer, &actor, &target).await?;

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

pub(super) async fn handle_invite(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
    user_id: &str,
    config: &CustomerConfig,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_checked_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;
    require_actor_membership(ctx, &customer.id, &actor, MembershipAction::Manage).await?;

    if actor.id == user_id {
        return Err(AuthError::CannotInviteSelf);
    }

    ctx.store
        .get_customer_user(&customer.id, user_id)
        .await?
        .ok_or_else(|| AuthError::not_found("Membership not found"))?;
    let target = ctx
        .store
        .get_user_by_id(user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    send_invitation_email(ctx, &customer, &target, config).await?;

    Ok(AuthResponse::json(200, &StatusResponse::ok())?)
}

pub(super) async fn handle_onboard(
    req: &AuthRequest,
    ctx: &AuthContext,
    id: &str,
) -> AuthResult<AuthResponse> {
    let (actor, _) = require_session(req, ctx).await?;
    let customer = load_customer(ctx, id).await?;

    if !actor.has_password() {
        return Err(AuthError::validation(
            "Set a password before completing onboarding",
        ));
    }
    if ctx.settings.require_terms_acceptance() && !actor.accepted_terms {
        return Err(AuthError::TermsNotAccepted);
    }

    let membership = onboard(ctx, &customer, &actor).await?;

    if actor.registration_stage == Some(RegistrationStage::Onboard) {
        ctx.store
            .update_user(
                &actor.id,
                userhub_core::types::UpdateUser {
                    registration_stage: Some(None),
                    ..Default::default()
                },
            )
            .await?;
    }

    Ok(AuthResponse::json(200, &member_view(ctx, membership).await?)?)
}
