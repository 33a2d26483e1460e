use serde_json::json;

use userhub_core::types::{
    AuthRequest, CreateCustomer, CreateCustomerUser, CustomerKind, HttpMethod, MembershipKind,
    MembershipStatus, RegistrationStage, UpdateUser, VerificationPurpose,
};
use userhub_core::{AuthError, AuthPlugin};

use super::EmailVerificationPlugin;
use crate::plugins::helpers::issue_verification;
use crate::plugins::test_helpers::{TestHarness, create_test_context};

fn verify_request(key: &str) -> AuthRequest {
    AuthRequest::new(HttpMethod::Post, "/auth/registration/verify-email")
        .with_body(&json!({ "key": key }))
}

async fn issue_key(harness: &TestHarness, user: &userhub_core::types::User) -> String {
    issue_verification(
        &harness.ctx,
        user,
        VerificationPurpose::VerifyEmail,
        chrono::Duration::days(1),
    )
    .await
    .unwrap()
    .value
}

#[tokio::test]
async fn valid_key_verifies_the_user() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
    let key = issue_key(&harness, &user).await;

    let resp = plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status, 200);
    assert!(harness.ctx.store.is_user_verified(&user.id).await.unwrap());
}

#[tokio::test]
async fn unknown_key_is_rejected() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();

    let err = plugin
        .on_request(&verify_request("verify_nope"), &harness.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidVerificationKey));
}

#[tokio::test]
async fn key_is_single_use() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
    let key = issue_key(&harness, &user).await;

    plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap();

    // the user is verified now, so the consumed key still answers ok
    let resp = plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn consumed_key_for_unverified_user_is_rejected() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;
    let key = issue_key(&harness, &user).await;

    harness
        .ctx
        .store
        .consume_verification(VerificationPurpose::VerifyEmail, &key)
        .await
        .unwrap();

    let err = plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidVerificationKey));
}

#[tokio::test]
async fn verification_promotes_pending_membership_and_clears_stage() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("boss@acme.example", "Tr0ub4dor&3").await;

    let customer = harness
        .ctx
        .store
        .create_customer(CreateCustomer {
            name: "acme".into(),
            title: None,
            kind: CustomerKind::Multiple,
        })
        .await
        .unwrap();
    harness
        .ctx
        .store
        .create_customer_user(CreateCustomerUser {
            customer_id: customer.id.clone(),
            user_id: user.id.clone(),
            kind: MembershipKind::Manager,
            status: MembershipStatus::Pending,
        })
        .await
        .unwrap();
    harness
        .ctx
        .store
        .update_user(
            &user.id,
            UpdateUser {
                registration_stage: Some(Some(RegistrationStage::CustomerUser)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let key = issue_key(&harness, &user).await;
    plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap();

    let membership = harness
        .ctx
        .store
        .get_customer_user(&customer.id, &user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.status, MembershipStatus::Active);

    let user = harness
        .ctx
        .store
        .get_user_by_id(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.registration_stage, None);
}

#[tokio::test]
async fn onboard_stage_survives_verification() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("inv@example.com", "Tr0ub4dor&3").await;
    harness
        .ctx
        .store
        .update_user(
            &user.id,
            UpdateUser {
                registration_stage: Some(Some(RegistrationStage::Onboard)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let key = issue_key(&harness, &user).await;
    plugin
        .on_request(&verify_request(&key), &harness.ctx)
        .await
        .unwrap();

    let user = harness
        .ctx
        .store
        .get_user_by_id(&user.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.registration_stage, Some(RegistrationStage::Onboard));
}

#[tokio::test]
async fn resend_only_sends_for_unverified_accounts() {
    let harness = create_test_context();
    let plugin = EmailVerificationPlugin::new();
    let user = harness.register_user("a@example.com", "Tr0ub4dor&3").await;

    let resend = AuthRequest::new(HttpMethod::Post, "/auth/send-email-verification")
        .with_body(&json!({ "email": "a@example.com" }));
    plugin.on_request(&resend, &harness.ctx).await.unwrap();
    assert_eq!(harness.sent.lock().unwrap().len(), 1);

    harness.verify_user(&user).await;
    plugin.on_request(&resend, &harness.ctx).await.unwrap();
    assert_eq!(harness.sent.lock().unwrap().len(), 1);

    // unknown address still answers ok and sends nothing
    let unknown = AuthRequest::new(HttpMethod::Post, "/auth/send-email-verification")
        .with_body(&json!({ "email": "ghost@example.com" }));
    let resp = plugin
        .on_request(&unknown, &harness.ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(harness.sent.lock().unwrap().len(), 1);
}
