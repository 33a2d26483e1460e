//! Authorization policies for customer-scoped and role-based access.

use userhub_core::types::{CustomerUser, RegistrationStage, User};
use userhub_core::{AuthContext, AuthError, AuthResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    /// View the customer and its members.
    Read,
    /// Change the customer or its memberships.
    Manage,
}

/// Access to a customer is derived from the actor's own membership row.
pub struct MembershipPolicy;

impl MembershipPolicy {
    pub fn authorize(membership: Option<&CustomerUser>, action: MembershipAction) -> bool {
        match (membership, action) {
            (Some(m), MembershipAction::Read) => m.is_active(),
            (Some(m), MembershipAction::Manage) => m.is_active() && m.is_manager(),
            (None, _) => false,
        }
    }
}

/// One-time allowance for a fresh registrant, parked at the membership
/// stage, to create their own first membership row.
pub struct RegistrationStagePolicy;

impl RegistrationStagePolicy {
    pub fn may_bootstrap_membership(actor: &User, target_email: &str) -> bool {
        actor.registration_stage == Some(RegistrationStage::CustomerUser)
            && actor.email.eq_ignore_ascii_case(target_email)
    }
}

/// Check a named permission against the union of the user's role grants.
pub async fn has_permission(
    ctx: &AuthContext,
    user_id: &str,
    permission: &str,
) -> AuthResult<bool> {
    Ok(ctx
        .store
        .effective_permissions(user_id)
        .await?
        .contains(permission))
}

/// Like [`has_permission`] but failing with `Forbidden`.
pub async fn require_permission(
    ctx: &AuthContext,
    user_id: &str,
    permission: &str,
) -> AuthResult<()> {
    if has_permission(ctx, user_id, permission).await? {
        Ok(())
    } else {
        Err(AuthError::forbidden("Insufficient permissions"))
    }
}
