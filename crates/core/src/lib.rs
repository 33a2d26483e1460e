//! Core building blocks for the userhub identity framework.
//!
//! This crate carries the domain model (users, customers, memberships,
//! messages, verifications), the [`IdentityStore`] persistence trait with
//! an in-memory implementation, session management, the password policy,
//! runtime settings and the plugin/event seams. HTTP-facing plugins live
//! in `userhub-api`.

pub mod adapters;
pub mod config;
pub mod email;
pub mod error;
pub mod events;
pub mod logger;
pub mod plugin;
pub mod policy;
pub mod profile;
pub mod session;
pub mod settings;
pub mod types;
pub mod utils;

pub use adapters::{IdentityStore, MemoryStore};
pub use config::{AuthConfig, PasswordConfig, SessionConfig};
pub use email::{ConsoleEmailProvider, EmailProvider};
pub use error::{AuthError, AuthResult, StoreError, validate_request_body};
pub use events::{DomainEvent, EventBus, EventListener, MessageListener};
pub use logger::{Logger, TracingLogger, default_logger};
pub use plugin::{AuthContext, AuthPlugin, AuthRoute};
pub use policy::{
    LengthValidator, PasswordInputs, PasswordPolicy, PasswordValidator, StrengthValidator,
    estimate_strength,
};
pub use profile::{ProfileCodec, ProfileRegistry};
pub use session::SessionManager;
pub use settings::{
    RESERVED_USERNAMES, SENTINEL_USERNAME, SettingsSnapshot, SettingsUpdate, UserSettings,
    is_reserved_username,
};
pub use types::{
    AuthRequest, AuthResponse, CreateCustomer, CreateCustomerUser, CreateEmailAddress,
    CreateMessage, CreatePermission, CreateRole, CreateSession, CreateUser, CreateVerification,
    Customer, CustomerKind, CustomerUser, EmailAddress, HttpMethod, MembershipKind,
    MembershipStatus, Message, Permission, RegistrationStage, Role, Session, SessionResponse,
    StatusResponse, UpdateCustomer, UpdateCustomerUser, UpdateMessage, UpdateUser, User,
    UserSummary, Verification, VerificationPurpose,
};
pub use utils::cookie::{create_clear_session_cookie, create_session_cookie};
pub use utils::password::{PasswordHasher, hash_password, verify_password};
