//! # userhub
//!
//! A pluggable user-identity module: registration with email verification
//! and approval gating, session login, password policy, multi-tenant
//! customer membership and per-user notifications.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use userhub::{AuthConfig, MemoryStore, UserHub};
//! use userhub::plugins::{LoginPlugin, RegistrationPlugin};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::new("your-secret-key-that-is-at-least-32-chars");
//!
//!     let hub = UserHub::new(config)
//!         .store(MemoryStore::new())
//!         .plugin(RegistrationPlugin::new())
//!         .plugin(LoginPlugin::new())
//!         .build()
//!         .await?;
//!
//!     let _ = hub;
//!     Ok(())
//! }
//! ```

pub mod core;

pub use core::{UserHub, UserHubBuilder};

pub use userhub_core::{
    AuthConfig, AuthContext, AuthError, AuthPlugin, AuthRequest, AuthResponse, AuthResult,
    AuthRoute, ConsoleEmailProvider, DomainEvent, EmailProvider, EventBus, EventListener,
    HttpMethod, IdentityStore, MemoryStore, MessageListener, PasswordConfig, PasswordPolicy,
    PasswordHasher, ProfileCodec, ProfileRegistry, SessionConfig, SessionManager,
    SettingsSnapshot, SettingsUpdate, StoreError, UserSettings, hash_password, verify_password,
};

pub use userhub_core::types::{
    Customer, CustomerKind, CustomerUser, EmailAddress, MembershipKind, MembershipStatus, Message,
    Permission, RegistrationStage, Role, Session, SessionResponse, User, UserSummary,
    Verification, VerificationPurpose,
};

pub mod types {
    pub use userhub_core::types::*;
}

pub mod plugins {
    pub use userhub_api::plugins::{
        AdminPlugin, CustomerPlugin, EmailVerificationPlugin, LoginPlugin, MessagesPlugin,
        PasswordManagementPlugin, RegistrationPlugin, UsersPlugin,
    };
    pub use userhub_api::CustomerConfig;
}

pub use userhub_api::{MembershipAction, MembershipPolicy, RegistrationStagePolicy};
