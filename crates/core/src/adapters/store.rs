//! Object-safe persistence trait.
//!
//! Implementations own identity storage end to end: users, email addresses,
//! customers, memberships, roles, messages, verifications and sessions.
//! Plugins only ever see `Arc<dyn IdentityStore>`.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::AuthResult;
use crate::types::{
    CreateCustomer, CreateCustomerUser, CreateEmailAddress, CreateMessage, CreatePermission,
    CreateRole, CreateSession, CreateUser, CreateVerification, Customer, CustomerUser,
    EmailAddress, Message, Permission, Role, Session, UpdateCustomer, UpdateCustomerUser,
    UpdateMessage, UpdateUser, User, Verification, VerificationPurpose,
};

#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    // -- users -------------------------------------------------------------

    /// Create a user. Fails with a conflict when the email or username is
    /// already taken (matching is case-insensitive).
    async fn create_user(&self, create: CreateUser) -> AuthResult<User>;
    async fn get_user_by_id(&self, id: &str) -> AuthResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> AuthResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> AuthResult<Option<User>>;
    async fn update_user(&self, id: &str, update: UpdateUser) -> AuthResult<User>;
    async fn delete_user(&self, id: &str) -> AuthResult<()>;
    async fn list_admins(&self) -> AuthResult<Vec<User>>;

    // -- email addresses ---------------------------------------------------

    /// Create an email address row. A `primary: true` row demotes any
    /// existing primary for the same user.
    async fn create_email_address(&self, create: CreateEmailAddress) -> AuthResult<EmailAddress>;
    async fn get_primary_email(&self, user_id: &str) -> AuthResult<Option<EmailAddress>>;
    async fn set_email_verified(&self, id: &str) -> AuthResult<EmailAddress>;

    /// A user is verified when their primary email address is verified.
    async fn is_user_verified(&self, user_id: &str) -> AuthResult<bool> {
        Ok(self
            .get_primary_email(user_id)
            .await?
            .map(|e| e.verified)
            .unwrap_or(false))
    }

    // -- customers ----------------------------------------------------------

    /// Create a customer. Fails with a conflict on a duplicate name
    /// (case-insensitive).
    async fn create_customer(&self, create: CreateCustomer) -> AuthResult<Customer>;
    async fn get_customer_by_id(&self, id: &str) -> AuthResult<Option<Customer>>;
    async fn get_customer_by_name(&self, name: &str) -> AuthResult<Option<Customer>>;
    async fn update_customer(&self, id: &str, update: UpdateCustomer) -> AuthResult<Customer>;

    // -- memberships ---------------------------------------------------------

    async fn create_customer_user(&self, create: CreateCustomerUser) -> AuthResult<CustomerUser>;
    async fn get_customer_user(
        &self,
        customer_id: &str,
        user_id: &str,
    ) -> AuthResult<Option<CustomerUser>>;
    async fn update_customer_user(
        &self,
        id: &str,
        update: UpdateCustomerUser,
    ) -> AuthResult<CustomerUser>;
    async fn delete_customer_user(&self, id: &str) -> AuthResult<()>;
    async fn list_customer_users(&self, customer_id: &str) -> AuthResult<Vec<CustomerUser>>;
    async fn list_user_memberships(&self, user_id: &str) -> AuthResult<Vec<CustomerUser>>;

    // -- roles and permissions ----------------------------------------------

    /// Register a permission definition. Names are unique and must match
    /// `[a-z0-9_.-]+`.
    async fn create_permission(&self, create: CreatePermission) -> AuthResult<Permission>;
    async fn get_permission_by_name(&self, name: &str) -> AuthResult<Option<Permission>>;
    async fn create_role(&self, create: CreateRole) -> AuthResult<Role>;
    async fn get_role_by_id(&self, id: &str) -> AuthResult<Option<Role>>;

    /// Union of permission names over all of the user's roles.
    async fn effective_permissions(&self, user_id: &str) -> AuthResult<BTreeSet<String>>;

    // -- messages -------------------------------------------------------------

    async fn create_message(&self, create: CreateMessage) -> AuthResult<Message>;
    async fn get_message(&self, user_id: &str, id: &str) -> AuthResult<Option<Message>>;
    async fn list_messages(&self, user_id: &str) -> AuthResult<Vec<Message>>;
    async fn update_message(&self, id: &str, update: UpdateMessage) -> AuthResult<Message>;

    /// Move every message from one user to another. Used when deleting an
    /// account: its messages are re-pointed at the sentinel user.
    async fn reassign_messages(&self, from_user_id: &str, to_user_id: &str) -> AuthResult<u64>;

    // -- verifications ---------------------------------------------------------

    async fn create_verification(&self, create: CreateVerification) -> AuthResult<Verification>;
    async fn get_verification_by_value(
        &self,
        purpose: VerificationPurpose,
        value: &str,
    ) -> AuthResult<Option<Verification>>;

    /// Atomically consume an unconsumed, unexpired verification.
    ///
    /// Returns `None` when the token is unknown, expired or already
    /// consumed, so a token can never be redeemed twice.
    async fn consume_verification(
        &self,
        purpose: VerificationPurpose,
        value: &str,
    ) -> AuthResult<Option<Verification>>;

    // -- sessions ---------------------------------------------------------------

    async fn create_session(&self, create: CreateSession) -> AuthResult<Session>;
    async fn get_session(&self, token: &str) -> AuthResult<Option<Session>>;
    async fn update_session_expiry(
        &self,
        token: &str,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> AuthResult<()>;
    async fn delete_session(&self, token: &str) -> AuthResult<()>;
    async fn delete_user_sessions(&self, user_id: &str) -> AuthResult<u64>;
    async fn delete_other_user_sessions(&self, user_id: &str, keep_token: &str)
    -> AuthResult<u64>;
    async fn delete_expired_sessions(&self) -> AuthResult<u64>;

    // -- profiles ----------------------------------------------------------------

    async fn upsert_profile(
        &self,
        user_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> AuthResult<()>;
    async fn get_profile(&self, user_id: &str, key: &str) -> AuthResult<Option<serde_json::Value>>;
    async fn list_profiles(
        &self,
        user_id: &str,
    ) -> AuthResult<std::collections::HashMap<String, serde_json::Value>>;
}
