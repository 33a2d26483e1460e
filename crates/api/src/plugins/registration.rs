//! Self-service registration.
//!
//! Creates the user, optionally the named customer with a pending manager
//! membership, records consent, and kicks off email verification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use userhub_core::types::{
    AuthRequest, AuthResponse, CreateCustomer, CreateCustomerUser, CreateEmailAddress, CreateUser,
    CustomerKind, HttpMethod, MembershipKind, MembershipStatus, RegistrationStage, UserSummary,
    VerificationPurpose,
};
use userhub_core::{
    AuthContext, AuthError, AuthPlugin, AuthResult, AuthRoute, DomainEvent, PasswordInputs,
    hash_password, is_reserved_username, validate_request_body,
};

use super::helpers::{issue_verification, send_verification_email};

pub struct RegistrationPlugin;

impl RegistrationPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RegistrationPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password1: String,
    pub password2: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub accepted_terms: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: bool,
    pub user: UserSummary,
}

#[async_trait]
impl AuthPlugin for RegistrationPlugin {
    fn name(&self) -> &'static str {
        "registration"
    }

    fn routes(&self) -> Vec<AuthRoute> {
        vec![AuthRoute::new(HttpMethod::Post, "/auth/register")]
    }

    async fn on_request(
        &self,
        req: &AuthRequest,
        ctx: &AuthContext,
    ) -> AuthResult<Option<AuthResponse>> {
        match (&req.method, req.path.as_str()) {
            (HttpMethod::Post, "/auth/register") => {
                Ok(Some(handle_register(req, ctx).await?))
            }
            _ => Ok(None),
        }
    }
}

async fn handle_register(req: &AuthRequest, ctx: &AuthContext) -> AuthResult<AuthResponse> {
    if !ctx.settings.allow_registration() {
        return Err(AuthError::RegistrationClosed);
    }

    let body = req.body.as_deref().unwrap_or_default();
    let request: RegisterRequest = validate_request_body(body)?;

    if request.password1 != request.password2 {
        return Err(AuthError::field("password2", "Passwords do not match"));
    }

    if let Some(username) = &request.username
        && is_reserved_username(username)
    {
        return Err(AuthError::field("username", "This username is reserved"));
    }

    if ctx
        .store
        .get_user_by_email(&request.email)
        .await?
        .is_some()
    {
        return Err(AuthError::field(
            "email",
            "A user with this email address already exists",
        ));
    }

    // Reject a taken customer name before any record is created.
    if let Some(customer_name) = &request.customer_name
        && ctx
            .store
            .get_customer_by_name(customer_name)
            .await?
            .is_some()
    {
        return Err(AuthError::field(
            "customerName",
            "A customer with this name already exists",
        ));
    }

    ctx.password_policy.check(
        &request.password1,
        &PasswordInputs {
            email: Some(&request.email),
            username: request.username.as_deref(),
            name: request.name.as_deref(),
        },
    )?;

    let hash = hash_password(None, &request.password1).await?;
    let mut create = CreateUser::new(&request.email).with_password_hash(hash);
    create.username = request.username.clone();
    create.name = request.name.clone();
    create.accepted_terms = request.accepted_terms;
    let user = ctx.store.create_user(create).await?;

    ctx.store
        .create_email_address(CreateEmailAddress {
            user_id: user.id.clone(),
            email: user.email.clone(),
            primary: true,
            verified: false,
        })
        .await?;

    let user = if let Some(customer_name) = &request.customer_name {
        let customer = ctx
            .store
            .create_customer(CreateCustomer {
                name: customer_name.clone(),
                title: Some(customer_name.clone()),
                kind: CustomerKind::Multiple,
            })
            .await?;

        let membership = ctx
            .store
            .create_customer_user(CreateCustomerUser {
                customer_id: customer.id.clone(),
                user_id: user.id.clone(),
                kind: MembershipKind::Manager,
                status: MembershipStatus::Pending,
            })
            .await?;

        let user = ctx
            .store
            .update_user(
                &user.id,
                userhub_core::types::UpdateUser {
                    registration_stage: Some(Some(RegistrationStage::CustomerUser)),
                    ..Default::default()
                },
            )
            .await?;

        ctx.events
            .dispatch(DomainEvent::CustomerGainedMember {
                customer,
                user: user.clone(),
                membership,
            })
            .await;
        user
    } else {
        user
    };

    let verification = issue_verification(
        ctx,
        &user,
        VerificationPurpose::VerifyEmail,
        ctx.config.password.verification_token_expires_in,
    )
    .await?;

    // The account exists either way; a failed send can be retried through
    // the resend endpoint.
    if let Err(e) = send_verification_email(ctx, &user, &verification).await {
        tracing::warn!(user = %user.id, error = %e, "failed to send verification email");
    }

    ctx.events
        .dispatch(DomainEvent::UserRegistered { user: user.clone() })
        .await;

    Ok(AuthResponse::json(
        200,
        &RegisterResponse {
            status: true,
            user: user.summary(),
        },
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::test_helpers::create_test_context;
    use serde_json::json;

    fn register_request(body: serde_json::Value) -> AuthRequest {
        AuthRequest::new(HttpMethod::Post, "/auth/register").with_body(&body)
    }

    #[tokio::test]
    async fn register_creates_unverified_user() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "alice@example.com",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
            "name": "Alice",
        }));
        let resp = plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();
        assert_eq!(resp.status, 200);

        let user = harness
            .ctx
            .store
            .get_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.is_active);
        assert!(!user.is_approved);
        assert!(!harness.ctx.store.is_user_verified(&user.id).await.unwrap());
        assert!(user.last_verification_id.is_some());

        // verification email went out
        let sent = harness.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert!(sent[0].text.contains("verify-email?key=verify_"));
    }

    #[tokio::test]
    async fn register_with_customer_name_creates_pending_manager() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "boss@acme.example",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
            "customerName": "acme",
        }));
        plugin.on_request(&req, &harness.ctx).await.unwrap().unwrap();

        let user = harness
            .ctx
            .store
            .get_user_by_email("boss@acme.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            user.registration_stage,
            Some(RegistrationStage::CustomerUser)
        );

        let customer = harness
            .ctx
            .store
            .get_customer_by_name("acme")
            .await
            .unwrap()
            .unwrap();
        let membership = harness
            .ctx
            .store
            .get_customer_user(&customer.id, &user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(membership.kind, MembershipKind::Manager);
        assert_eq!(membership.status, MembershipStatus::Pending);
    }

    #[tokio::test]
    async fn taken_customer_name_creates_no_user() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        harness
            .ctx
            .store
            .create_customer(CreateCustomer {
                name: "acme".into(),
                title: None,
                kind: CustomerKind::Multiple,
            })
            .await
            .unwrap();

        let req = register_request(json!({
            "email": "late@acme.example",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
            "customerName": "ACME",
        }));
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        let resp = err.into_response();
        assert_eq!(resp.status, 400);
        let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert!(body["errors"]["customerName"][0]
            .as_str()
            .unwrap()
            .contains("already exists"));

        assert!(harness
            .ctx
            .store
            .get_user_by_email("late@acme.example")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "a@example.com",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&4",
        }));
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Field { ref field, .. } if field == "password2"));
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "a@example.com",
            "password1": "password123",
            "password2": "password123",
        }));
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordTooWeak));
    }

    #[tokio::test]
    async fn reserved_username_is_rejected() {
        let harness = create_test_context();
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "a@example.com",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
            "username": "current",
        }));
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::Field { ref field, .. } if field == "username"));
    }

    #[tokio::test]
    async fn closed_registration_is_forbidden() {
        let harness = create_test_context();
        harness.ctx.settings.set_allow_registration(false);
        let plugin = RegistrationPlugin::new();

        let req = register_request(json!({
            "email": "a@example.com",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
        }));
        let err = plugin.on_request(&req, &harness.ctx).await.unwrap_err();
        assert!(matches!(err, AuthError::RegistrationClosed));
    }

    #[tokio::test]
    async fn signup_notification_reaches_admins() {
        let harness = create_test_context();
        harness.ctx.settings.set_notify_signups(true);
        let admin = harness
            .ctx
            .store
            .create_user(CreateUser {
                is_admin: true,
                ..CreateUser::new("admin@example.com")
            })
            .await
            .unwrap();

        let plugin = RegistrationPlugin::new();
        let req = register_request(json!({
            "email": "new@example.com",
            "password1": "Tr0ub4dor&3",
            "password2": "Tr0ub4dor&3",
        }));
        plugin.on_request(&req, &harness.ctx).await.unwrap();

        let inbox = harness.ctx.store.list_messages(&admin.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].subject.contains("new@example.com"));
    }
}
