use serde::de::DeserializeOwned;
use thiserror::Error;
use validator::Validate;

use crate::types::{AuthResponse, UserSummary};

/// Error type of a storage backend.
///
/// External adapters map their driver errors onto these variants; the
/// framework folds them into [`AuthError::Store`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Framework error type.
///
/// Each variant maps to an HTTP status code via [`AuthError::status_code`];
/// [`AuthError::into_response`] produces the JSON error body. Internal
/// errors are logged and masked with a generic message.
#[derive(Error, Debug)]
pub enum AuthError {
    // --- 400 Bad Request ---
    #[error("{message}")]
    Validation { message: String },

    /// A validation failure attributable to a single input field.
    #[error("{message}")]
    Field { field: String, message: String },

    #[error("This password is too short. It must contain at least {min} characters.")]
    PasswordTooShort { min: usize },

    #[error("This password is too long. It must contain at most {max} characters.")]
    PasswordTooLong { max: usize },

    #[error("This password is too weak.")]
    PasswordTooWeak,

    #[error("E-mail address has not been verified yet")]
    UserNotVerified { user: UserSummary },

    #[error("Account has not been approved yet")]
    UserNotApproved { user: UserSummary },

    #[error("Terms have not been accepted")]
    TermsNotAccepted,

    #[error("You cannot invite yourself")]
    CannotInviteSelf,

    #[error("You cannot remove yourself")]
    CannotRemoveSelf,

    // --- 401 Unauthorized ---
    #[error("Invalid credentials")]
    InvalidCredentials,

    // Deliberately indistinguishable from bad credentials.
    #[error("Invalid credentials")]
    AccountInactive,

    #[error("Authentication required")]
    Unauthenticated,

    // --- 403 Forbidden ---
    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Backend access is disabled")]
    BackendAccessDisabled,

    #[error("Password change required")]
    ChangePasswordRequired,

    #[error("{0}")]
    Forbidden(String),

    // --- 404 Not Found ---
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid verification key")]
    InvalidVerificationKey,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("{0}")]
    NotFound(String),

    // --- 409 Conflict ---
    #[error("{0}")]
    Conflict(String),

    // --- 500 Internal Server Error ---
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::Field { .. }
            | Self::PasswordTooShort { .. }
            | Self::PasswordTooLong { .. }
            | Self::PasswordTooWeak
            | Self::UserNotVerified { .. }
            | Self::UserNotApproved { .. }
            | Self::TermsNotAccepted
            | Self::CannotInviteSelf
            | Self::CannotRemoveSelf => 400,
            Self::InvalidCredentials | Self::AccountInactive | Self::Unauthenticated => 401,
            Self::RegistrationClosed
            | Self::BackendAccessDisabled
            | Self::ChangePasswordRequired
            | Self::Forbidden(_) => 403,
            Self::UserNotFound
            | Self::InvalidVerificationKey
            | Self::InvalidResetToken
            | Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Store(_)
            | Self::Serialization(_)
            | Self::PasswordHash(_)
            | Self::Email(_)
            | Self::Configuration(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Convert this error into a JSON [`AuthResponse`].
    ///
    /// Internal errors (500) are logged and masked with a generic message.
    /// Field errors carry an `errors` map keyed by field name, and the
    /// verification/approval gates include a summary of the affected user.
    pub fn into_response(self) -> AuthResponse {
        let status = self.status_code();

        let body = match &self {
            Self::Field { field, message } => serde_json::json!({
                "message": message,
                "errors": { field: [message] },
            }),
            Self::UserNotVerified { user } | Self::UserNotApproved { user } => serde_json::json!({
                "message": self.to_string(),
                "user": user,
            }),
            _ if status == 500 => {
                tracing::error!(error = %self, "request failed");
                serde_json::json!({ "message": "Internal server error" })
            }
            _ => serde_json::json!({ "message": self.to_string() }),
        };

        AuthResponse::json(status, &body).unwrap_or_else(|_| {
            let mut resp = AuthResponse::new(status);
            resp.body = b"{\"message\":\"Internal server error\"}".to_vec();
            resp
        })
    }

    // --- Constructors ---

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::PasswordHash(err.to_string())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Parse and validate a JSON request body.
///
/// Malformed JSON becomes a plain validation error; a failed `validator`
/// check is reported as a [`AuthError::Field`] for the first failing field.
pub fn validate_request_body<T>(body: &[u8]) -> AuthResult<T>
where
    T: DeserializeOwned + Validate,
{
    let value: T = serde_json::from_slice(body)
        .map_err(|e| AuthError::validation(format!("Invalid request body: {e}")))?;
    value.validate().map_err(|e| validation_errors_to_auth(&e))?;
    Ok(value)
}

fn validation_errors_to_auth(errors: &validator::ValidationErrors) -> AuthError {
    for (field, errs) in errors.field_errors() {
        if let Some(err) = errs.first() {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for {field}"));
            return AuthError::field(field.to_string(), message);
        }
    }
    AuthError::validation("Validation failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(err: AuthError) -> serde_json::Value {
        serde_json::from_slice(&err.into_response().body).unwrap()
    }

    #[test]
    fn inactive_account_reads_like_bad_credentials() {
        assert_eq!(AuthError::AccountInactive.to_string(), "Invalid credentials");
        assert_eq!(AuthError::AccountInactive.status_code(), 401);
    }

    #[test]
    fn field_errors_carry_a_per_field_map() {
        let body = body_of(AuthError::field("password2", "Passwords do not match"));
        assert_eq!(body["errors"]["password2"][0], "Passwords do not match");
    }

    #[test]
    fn internal_errors_are_masked() {
        let body = body_of(AuthError::internal("connection refused"));
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn gate_errors_embed_the_user_summary() {
        let err = AuthError::UserNotVerified {
            user: UserSummary {
                email: "a@example.com".to_string(),
                name: None,
            },
        };
        assert_eq!(err.status_code(), 400);
        let body = body_of(err);
        assert_eq!(body["user"]["email"], "a@example.com");
    }

    #[test]
    fn store_errors_surface_as_500() {
        let err = AuthError::from(StoreError::Backend("io".to_string()));
        assert_eq!(err.status_code(), 500);
    }

    #[derive(Debug, serde::Deserialize, Validate)]
    struct Probe {
        #[validate(email(message = "Enter a valid e-mail address"))]
        email: String,
    }

    #[test]
    fn body_validation_reports_the_failing_field() {
        let err = validate_request_body::<Probe>(br#"{"email":"nope"}"#).unwrap_err();
        assert!(matches!(err, AuthError::Field { ref field, .. } if field == "email"));
    }
}
