//! Domain types and the framework-agnostic HTTP request/response model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stage a user is at inside the multi-step registration flow.
///
/// `None` on the user record means registration is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStage {
    /// Account created, nothing else yet.
    User,
    /// Waiting for the customer record to be created.
    Customer,
    /// Waiting for the first customer membership to be created.
    CustomerUser,
    /// Waiting for a first order (handled outside this crate).
    Order,
    /// Invited user who still has to set a password and accept terms.
    Onboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerKind {
    /// Personal customer backing exactly one user.
    Single,
    /// Organization with any number of members.
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipKind {
    Manager,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Pending,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationPurpose {
    VerifyEmail,
    ResetPassword,
}

impl fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifyEmail => write!(f, "VERIFY_EMAIL"),
            Self::ResetPassword => write!(f, "RESET_PASSWORD"),
        }
    }
}

/// A user account.
///
/// Verification state is not stored here; it is derived from the primary
/// [`EmailAddress`] so the two can never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub name: Option<String>,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_admin: bool,
    pub accepted_terms: bool,
    /// When set, the next login short-circuits into a password reset.
    pub change_password: bool,
    pub registration_stage: Option<RegistrationStage>,
    /// Most recent verification issued for this user, for re-send bookkeeping.
    #[serde(skip)]
    pub last_verification_id: Option<String>,
    pub role_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Lightweight projection embedded in gate-failure responses.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub primary: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub kind: CustomerKind,
    pub url: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub logo: Option<String>,
    /// Default roles tracked for this customer, not auto-applied to members.
    pub role_ids: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a user in a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUser {
    pub id: String,
    pub customer_id: String,
    pub user_id: String,
    pub kind: MembershipKind,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerUser {
    pub fn is_manager(&self) -> bool {
        self.kind == MembershipKind::Manager
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// A named permission, e.g. `orders.create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A role groups permissions; users carry roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Permission names granted by this role.
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<String>,
    pub read: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Single-use token backing email verification and password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: String,
    pub user_id: String,
    pub purpose: VerificationPurpose,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Verification {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Creation / update payloads consumed by the store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_admin: bool,
    pub accepted_terms: bool,
    pub change_password: bool,
    pub registration_stage: Option<RegistrationStage>,
}

impl CreateUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            is_active: true,
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn with_stage(mut self, stage: RegistrationStage) -> Self {
        self.registration_stage = Some(stage);
        self
    }
}

/// Partial user update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_approved: Option<bool>,
    pub accepted_terms: Option<bool>,
    pub change_password: Option<bool>,
    pub registration_stage: Option<Option<RegistrationStage>>,
    pub last_verification_id: Option<Option<String>>,
    pub role_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CreateEmailAddress {
    pub user_id: String,
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub name: String,
    pub title: Option<String>,
    pub kind: CustomerKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomer {
    pub title: Option<String>,
    pub url: Option<String>,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub logo: Option<String>,
    pub role_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CreateCustomerUser {
    pub customer_id: String,
    pub user_id: String,
    pub kind: MembershipKind,
    pub status: MembershipStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCustomerUser {
    pub kind: Option<MembershipKind>,
    pub status: Option<MembershipStatus>,
}

#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub user_id: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMessage {
    pub read: Option<bool>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateVerification {
    pub user_id: String,
    pub purpose: VerificationPurpose,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePermission {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSession {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// ---------------------------------------------------------------------------
// HTTP model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

/// Framework-agnostic request wrapper.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub query: HashMap<String, String>,
}

impl AuthRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
        }
    }

    pub fn from_parts(
        method: HttpMethod,
        path: String,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
        query: HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            body,
            query,
        }
    }

    pub fn with_body<T: Serialize>(mut self, data: &T) -> Self {
        self.body = serde_json::to_vec(data).ok();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(name)
    }

    /// Path split into non-empty segments, for parameterised routes.
    pub fn path_segments(&self) -> Vec<&str> {
        self.path.split('/').filter(|s| !s.is_empty()).collect()
    }
}

/// Framework-agnostic response wrapper.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl AuthResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn json<T: Serialize>(status: u16, data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Like [`AuthResponse::json`] but for an already-built `Value`,
    /// which cannot fail to serialize.
    pub fn json_value(status: u16, value: serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            status,
            headers,
            body: value.to_string().into_bytes(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Common response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: bool,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: true }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_skips_empty() {
        let req = AuthRequest::new(HttpMethod::Get, "/customers/c1/users/");
        assert_eq!(req.path_segments(), vec!["customers", "c1", "users"]);
    }

    #[test]
    fn user_serializes_without_password_hash() {
        let now = Utc::now();
        let user = User {
            id: "u1".into(),
            email: "a@example.com".into(),
            username: None,
            name: None,
            password_hash: Some("secret".into()),
            is_active: true,
            is_approved: false,
            is_admin: false,
            accepted_terms: false,
            change_password: false,
            registration_stage: Some(RegistrationStage::Customer),
            last_verification_id: None,
            role_ids: vec![],
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["registrationStage"], "CUSTOMER");
    }
}
