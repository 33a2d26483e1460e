//! Pluggable password policy.
//!
//! A [`PasswordPolicy`] is an ordered list of validators run against a
//! candidate password together with the user inputs it must not be derived
//! from. The default policy mirrors the configured length bounds and
//! strength threshold.

use std::sync::Arc;

use crate::config::PasswordConfig;
use crate::error::{AuthError, AuthResult};
use crate::settings::UserSettings;

/// User-derived strings a password is checked against, so that
/// `alice@example.com` cannot pick `alice12345`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordInputs<'a> {
    pub email: Option<&'a str>,
    pub username: Option<&'a str>,
    pub name: Option<&'a str>,
}

impl<'a> PasswordInputs<'a> {
    fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();

        if let Some(email) = self.email {
            tokens.push(email.to_lowercase());
            if let Some((local, _)) = email.split_once('@') {
                tokens.push(local.to_lowercase());
            }
        }
        if let Some(username) = self.username {
            tokens.push(username.to_lowercase());
        }
        if let Some(name) = self.name {
            for word in name.split_whitespace() {
                tokens.push(word.to_lowercase());
            }
        }

        tokens.retain(|t| t.len() >= 4);
        tokens
    }
}

pub trait PasswordValidator: Send + Sync {
    fn validate(&self, password: &str, inputs: &PasswordInputs) -> AuthResult<()>;
}

/// Rejects passwords outside the configured length bounds.
pub struct LengthValidator {
    pub min: usize,
    pub max: usize,
}

impl PasswordValidator for LengthValidator {
    fn validate(&self, password: &str, _inputs: &PasswordInputs) -> AuthResult<()> {
        let len = password.chars().count();
        if len < self.min {
            return Err(AuthError::PasswordTooShort { min: self.min });
        }
        if len > self.max {
            return Err(AuthError::PasswordTooLong { max: self.max });
        }
        Ok(())
    }
}

/// Rejects passwords scoring below a strength threshold.
pub struct StrengthValidator {
    /// Minimum acceptable score, 0..=4.
    pub threshold: u8,
}

impl PasswordValidator for StrengthValidator {
    fn validate(&self, password: &str, inputs: &PasswordInputs) -> AuthResult<()> {
        if estimate_strength(password, inputs) < self.threshold {
            return Err(AuthError::PasswordTooWeak);
        }
        Ok(())
    }
}

/// Length validator reading the live settings on every check.
struct SettingsLengthValidator {
    settings: Arc<UserSettings>,
}

impl PasswordValidator for SettingsLengthValidator {
    fn validate(&self, password: &str, inputs: &PasswordInputs) -> AuthResult<()> {
        LengthValidator {
            min: self.settings.password_min_length(),
            max: self.settings.password_max_length(),
        }
        .validate(password, inputs)
    }
}

/// Strength validator reading the live settings on every check.
struct SettingsStrengthValidator {
    settings: Arc<UserSettings>,
}

impl PasswordValidator for SettingsStrengthValidator {
    fn validate(&self, password: &str, inputs: &PasswordInputs) -> AuthResult<()> {
        StrengthValidator {
            threshold: self.settings.password_strength_threshold(),
        }
        .validate(password, inputs)
    }
}

/// Score a password from 0 (trivial) to 4 (strong).
///
/// The score grows with character-class variety and length, collapses for
/// near-constant strings, and is capped at 1 when the password is derived
/// from one of the user's own identifiers.
pub fn estimate_strength(password: &str, inputs: &PasswordInputs) -> u8 {
    let len = password.chars().count();
    if len == 0 {
        return 0;
    }

    let lowered = password.to_lowercase();
    for token in inputs.tokens() {
        if lowered.contains(&token) || token.contains(&lowered) {
            return u8::from(len >= 16);
        }
    }

    let unique: std::collections::BTreeSet<char> = password.chars().collect();
    if unique.len() <= 2 {
        return u8::from(len >= 12);
    }

    let mut has_lower = false;
    let mut has_upper = false;
    let mut has_digit = false;
    let mut has_other = false;
    for c in password.chars() {
        if c.is_lowercase() {
            has_lower = true;
        } else if c.is_uppercase() {
            has_upper = true;
        } else if c.is_ascii_digit() {
            has_digit = true;
        } else {
            has_other = true;
        }
    }
    let classes =
        u8::from(has_lower) + u8::from(has_upper) + u8::from(has_digit) + u8::from(has_other);

    let mut score = classes.saturating_sub(1);
    if len >= 12 {
        score += 1;
    }
    if len >= 16 {
        score += 1;
    }
    if len < 8 {
        score = score.saturating_sub(1);
    }

    score.min(4)
}

pub struct PasswordPolicy {
    validators: Vec<Box<dyn PasswordValidator>>,
}

impl PasswordPolicy {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Length and strength validators that re-read the settings on each
    /// check, so admin adjustments apply without a rebuild.
    pub fn from_settings(settings: &Arc<UserSettings>) -> Self {
        Self::new()
            .with_validator(Box::new(SettingsLengthValidator {
                settings: settings.clone(),
            }))
            .with_validator(Box::new(SettingsStrengthValidator {
                settings: settings.clone(),
            }))
    }

    /// Length and strength validators fixed at the config's values.
    pub fn from_config(config: &PasswordConfig) -> Self {
        Self::new()
            .with_validator(Box::new(LengthValidator {
                min: config.min_length,
                max: config.max_length,
            }))
            .with_validator(Box::new(StrengthValidator {
                threshold: config.strength_threshold,
            }))
    }

    pub fn with_validator(mut self, validator: Box<dyn PasswordValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Run all validators in order; the first failure wins.
    pub fn check(&self, password: &str, inputs: &PasswordInputs) -> AuthResult<()> {
        for validator in &self.validators {
            validator.validate(password, inputs)?;
        }
        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::from_config(&PasswordConfig::default())
    }
}
