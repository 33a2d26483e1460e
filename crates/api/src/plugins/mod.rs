pub mod admin;
pub mod customer;
pub mod email_verification;
pub mod helpers;
pub mod login;
pub mod messages;
pub mod password_management;
pub mod registration;
pub mod users;

pub use admin::AdminPlugin;
pub use customer::CustomerPlugin;
pub use email_verification::EmailVerificationPlugin;
pub use login::LoginPlugin;
pub use messages::MessagesPlugin;
pub use password_management::PasswordManagementPlugin;
pub use registration::RegistrationPlugin;
pub use users::UsersPlugin;

#[cfg(test)]
pub(crate) mod test_helpers;
