use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    pub new_password1: String,
    pub new_password2: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password1: String,
    pub new_password2: String,
    #[serde(default)]
    pub revoke_other_sessions: bool,
}
