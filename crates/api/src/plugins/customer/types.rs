use serde::{Deserialize, Serialize};
use validator::Validate;

use userhub_core::types::{CustomerUser, MembershipKind, UserSummary};

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    /// Defaults to `MEMBER` when omitted.
    pub kind: Option<MembershipKind>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    pub kind: MembershipKind,
}

/// Membership row joined with a lightweight user projection.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    #[serde(flatten)]
    pub membership: CustomerUser,
    pub user: UserSummary,
}
