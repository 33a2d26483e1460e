//! HTTP-facing plugins for the userhub identity framework.
//!
//! Each plugin handles a slice of the route surface over the
//! framework-agnostic request/response types from `userhub-core`. Hosts
//! compose them through the `UserHub` builder in the root crate.

pub mod authz;
pub mod plugins;

pub use authz::{
    MembershipAction, MembershipPolicy, RegistrationStagePolicy, has_permission,
    require_permission,
};
pub use plugins::{
    AdminPlugin, CustomerPlugin, EmailVerificationPlugin, LoginPlugin, MessagesPlugin,
    PasswordManagementPlugin, RegistrationPlugin, UsersPlugin,
};
pub use plugins::customer::CustomerConfig;
pub use plugins::helpers::{check_user, require_checked_session, require_session};
