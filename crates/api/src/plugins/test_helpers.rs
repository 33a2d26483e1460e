//! Shared fixtures for plugin tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use userhub_core::types::{CreateEmailAddress, CreateUser, UpdateUser, User};
use userhub_core::{
    AuthConfig, AuthContext, AuthResult, EmailProvider, EventBus, MemoryStore, MessageListener,
    ProfileRegistry, UserSettings, hash_password,
};

pub(crate) const TEST_SECRET: &str = "an-adequately-long-test-secret-value-123";

/// Email provider that records sends instead of delivering them.
pub(crate) struct MockEmailProvider {
    pub sent: Arc<Mutex<Vec<SentEmail>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct SentEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, to: &str, subject: &str, _html: &str, text: &str) -> AuthResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

pub(crate) struct TestHarness {
    pub ctx: AuthContext,
    pub sent: Arc<Mutex<Vec<SentEmail>>>,
}

pub(crate) fn create_test_context() -> TestHarness {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let provider = Arc::new(MockEmailProvider { sent: sent.clone() });

    let config = Arc::new(AuthConfig::new(TEST_SECRET).email_provider(provider));
    let settings = Arc::new(UserSettings::new());
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    let mut events = EventBus::new();
    events.subscribe(Arc::new(MessageListener::new(
        store.clone(),
        settings.clone(),
    )));

    let ctx = AuthContext::new(
        config,
        settings,
        store,
        Arc::new(events),
        Arc::new(ProfileRegistry::new()),
    );

    TestHarness { ctx, sent }
}

impl TestHarness {
    /// Create a user with a hashed password and an unverified primary email,
    /// bypassing the registration endpoint.
    pub async fn register_user(&self, email: &str, password: &str) -> User {
        let hash = hash_password(None, password).await.unwrap();
        let user = self
            .ctx
            .store
            .create_user(CreateUser::new(email).with_password_hash(hash))
            .await
            .unwrap();
        self.ctx
            .store
            .create_email_address(CreateEmailAddress {
                user_id: user.id.clone(),
                email: email.to_string(),
                primary: true,
                verified: false,
            })
            .await
            .unwrap();
        user
    }

    /// Create a verified admin with a hashed password.
    pub async fn register_admin(&self, email: &str, password: &str) -> User {
        let hash = hash_password(None, password).await.unwrap();
        let user = self
            .ctx
            .store
            .create_user(CreateUser {
                is_admin: true,
                ..CreateUser::new(email).with_password_hash(hash)
            })
            .await
            .unwrap();
        self.ctx
            .store
            .create_email_address(CreateEmailAddress {
                user_id: user.id.clone(),
                email: email.to_string(),
                primary: true,
                verified: true,
            })
            .await
            .unwrap();
        user
    }

    /// Mark the user's primary email as verified.
    pub async fn verify_user(&self, user: &User) {
        let email = self
            .ctx
            .store
            .get_primary_email(&user.id)
            .await
            .unwrap()
            .unwrap();
        self.ctx.store.set_email_verified(&email.id).await.unwrap();
    }

    pub async fn set_change_password(&self, user: &User, value: bool) -> User {
        self.ctx
            .store
            .update_user(
                &user.id,
                UpdateUser {
                    change_password: Some(value),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    /// Open a session for the user and return its bearer token.
    pub async fn session_token(&self, user: &User) -> String {
        self.ctx
            .session_manager()
            .create_session(user, None, None)
            .await
            .unwrap()
            .token
    }
}
