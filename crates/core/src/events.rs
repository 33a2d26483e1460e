//! Domain events emitted by workflow mutations.
//!
//! Listener failures are logged and swallowed; a broken side channel must
//! never roll back the data change that triggered it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::adapters::IdentityStore;
use crate::error::AuthResult;
use crate::settings::UserSettings;
use crate::types::{CreateMessage, Customer, CustomerUser, MembershipKind, User};

#[derive(Debug, Clone)]
pub enum DomainEvent {
    UserRegistered {
        user: User,
    },
    UserVerified {
        user: User,
    },
    UserApproved {
        user: User,
    },
    CustomerGainedMember {
        customer: Customer,
        user: User,
        membership: CustomerUser,
    },
    MemberOnboarded {
        customer: Customer,
        user: User,
    },
    ManagerGranted {
        customer: Customer,
        user: User,
    },
    ManagerRevoked {
        customer: Customer,
        user: User,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserRegistered { .. } => "user.registered",
            Self::UserVerified { .. } => "user.verified",
            Self::UserApproved { .. } => "user.approved",
            Self::CustomerGainedMember { .. } => "customer.gained_member",
            Self::MemberOnboarded { .. } => "customer.member_onboarded",
            Self::ManagerGranted { .. } => "customer.manager_granted",
            Self::ManagerRevoked { .. } => "customer.manager_revoked",
        }
    }
}

#[async_trait]
pub trait EventListener: Send + Sync {
    fn name(&self) -> &'static str;
    async fn handle(&self, event: &DomainEvent) -> AuthResult<()>;
}

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Deliver an event to every listener. Failures are logged, not raised.
    pub async fn dispatch(&self, event: DomainEvent) {
        for listener in &self.listeners {
            if let Err(e) = listener.handle(&event).await {
                tracing::warn!(
                    listener = listener.name(),
                    event = event.name(),
                    error = %e,
                    "event listener failed"
                );
            }
        }
    }
}

/// Built-in listener that turns events into inbox [`Message`](crate::types::Message)s.
///
/// - `UserRegistered` notifies admins when signup notifications are on.
/// - `UserApproved` notifies the approved user.
/// - `MemberOnboarded` notifies the customer's managers.
/// - `ManagerGranted` / `ManagerRevoked` notify the affected user.
pub struct MessageListener {
    store: Arc<dyn IdentityStore>,
    settings: Arc<UserSettings>,
}

impl MessageListener {
    pub fn new(store: Arc<dyn IdentityStore>, settings: Arc<UserSettings>) -> Self {
        Self { store, settings }
    }
}

#[async_trait]
impl EventListener for MessageListener {
    fn name(&self) -> &'static str {
        "message-listener"
    }

    async fn handle(&self, event: &DomainEvent) -> AuthResult<()> {
        match event {
            DomainEvent::UserRegistered { user } => {
                if !self.settings.notify_signups() {
                    return Ok(());
                }
                for admin in self.store.list_admins().await? {
                    self.store
                        .create_message(CreateMessage {
                            user_id: admin.id,
                            subject: format!("New signup: {}", user.email),
                            body: format!("{} has registered a new account.", user.email),
                            attachments: Vec::new(),
                        })
                        .await?;
                }
            }
            DomainEvent::UserApproved { user } => {
                self.store
                    .create_message(CreateMessage {
                        user_id: user.id.clone(),
                        subject: "Your account has been approved".to_string(),
                        body: "You can now sign in and use your account.".to_string(),
                        attachments: Vec::new(),
                    })
                    .await?;
            }
            DomainEvent::MemberOnboarded { customer, user } => {
                for membership in self.store.list_customer_users(&customer.id).await? {
                    if membership.kind != MembershipKind::Manager
                        || membership.user_id == user.id
                    {
                        continue;
                    }
                    self.store
                        .create_message(CreateMessage {
                            user_id: membership.user_id,
                            subject: format!("{} joined {}", user.email, customer.name),
                            body: format!(
                                "{} has completed onboarding for {}.",
                                user.email, customer.name
                            ),
                            attachments: Vec::new(),
                        })
                        .await?;
                }
            }
            DomainEvent::ManagerGranted { customer, user } => {
                self.store
                    .create_message(CreateMessage {
                        user_id: user.id.clone(),
                        subject: format!("You are now a manager of {}", customer.name),
                        body: format!(
                            "You have been granted manager access to {}.",
                            customer.name
                        ),
                        attachments: Vec::new(),
                    })
                    .await?;
            }
            DomainEvent::ManagerRevoked { customer, user } => {
                self.store
                    .create_message(CreateMessage {
                        user_id: user.id.clone(),
                        subject: format!("Manager access to {} removed", customer.name),
                        body: format!(
                            "Your manager access to {} has been revoked.",
                            customer.name
                        ),
                        attachments: Vec::new(),
                    })
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }
}
