//! Runtime-tunable behavior switches.
//!
//! Unlike [`AuthConfig`](crate::config::AuthConfig), these can be flipped
//! while the service is running, e.g. through the admin endpoints.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Usernames that can never be claimed because routes treat them specially.
pub const RESERVED_USERNAMES: &[&str] = &["current", "deleted"];

/// Username of the sentinel account that absorbs records of deleted users.
pub const SENTINEL_USERNAME: &str = "deleted";

#[derive(Debug)]
pub struct UserSettings {
    allow_registration: AtomicBool,
    require_verification: AtomicBool,
    require_approval: AtomicBool,
    require_terms_acceptance: AtomicBool,
    notify_signups: AtomicBool,
    enable_backend_access: AtomicBool,
    password_min_length: AtomicUsize,
    password_max_length: AtomicUsize,
    password_strength_threshold: AtomicU8,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            allow_registration: AtomicBool::new(true),
            require_verification: AtomicBool::new(true),
            require_approval: AtomicBool::new(false),
            require_terms_acceptance: AtomicBool::new(false),
            notify_signups: AtomicBool::new(false),
            enable_backend_access: AtomicBool::new(false),
            password_min_length: AtomicUsize::new(8),
            password_max_length: AtomicUsize::new(255),
            password_strength_threshold: AtomicU8::new(2),
        }
    }
}

impl UserSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_registration(&self) -> bool {
        self.allow_registration.load(Ordering::Relaxed)
    }

    pub fn require_verification(&self) -> bool {
        self.require_verification.load(Ordering::Relaxed)
    }

    pub fn require_approval(&self) -> bool {
        self.require_approval.load(Ordering::Relaxed)
    }

    pub fn require_terms_acceptance(&self) -> bool {
        self.require_terms_acceptance.load(Ordering::Relaxed)
    }

    pub fn notify_signups(&self) -> bool {
        self.notify_signups.load(Ordering::Relaxed)
    }

    pub fn enable_backend_access(&self) -> bool {
        self.enable_backend_access.load(Ordering::Relaxed)
    }

    pub fn set_allow_registration(&self, value: bool) {
        self.allow_registration.store(value, Ordering::Relaxed);
    }

    pub fn set_require_verification(&self, value: bool) {
        self.require_verification.store(value, Ordering::Relaxed);
    }

    pub fn set_require_approval(&self, value: bool) {
        self.require_approval.store(value, Ordering::Relaxed);
    }

    pub fn set_require_terms_acceptance(&self, value: bool) {
        self.require_terms_acceptance.store(value, Ordering::Relaxed);
    }

    pub fn set_notify_signups(&self, value: bool) {
        self.notify_signups.store(value, Ordering::Relaxed);
    }

    pub fn set_enable_backend_access(&self, value: bool) {
        self.enable_backend_access.store(value, Ordering::Relaxed);
    }

    pub fn password_min_length(&self) -> usize {
        self.password_min_length.load(Ordering::Relaxed)
    }

    pub fn password_max_length(&self) -> usize {
        self.password_max_length.load(Ordering::Relaxed)
    }

    pub fn password_strength_threshold(&self) -> u8 {
        self.password_strength_threshold.load(Ordering::Relaxed)
    }

    pub fn set_password_min_length(&self, value: usize) {
        self.password_min_length.store(value, Ordering::Relaxed);
    }

    pub fn set_password_max_length(&self, value: usize) {
        self.password_max_length.store(value, Ordering::Relaxed);
    }

    pub fn set_password_strength_threshold(&self, value: u8) {
        self.password_strength_threshold.store(value, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            allow_registration: self.allow_registration(),
            require_verification: self.require_verification(),
            require_approval: self.require_approval(),
            require_terms_acceptance: self.require_terms_acceptance(),
            notify_signups: self.notify_signups(),
            enable_backend_access: self.enable_backend_access(),
            password_min_length: self.password_min_length(),
            password_max_length: self.password_max_length(),
            password_strength_threshold: self.password_strength_threshold(),
        }
    }

    pub fn apply(&self, update: &SettingsUpdate) {
        if let Some(v) = update.allow_registration {
            self.set_allow_registration(v);
        }
        if let Some(v) = update.require_verification {
            self.set_require_verification(v);
        }
        if let Some(v) = update.require_approval {
            self.set_require_approval(v);
        }
        if let Some(v) = update.require_terms_acceptance {
            self.set_require_terms_acceptance(v);
        }
        if let Some(v) = update.notify_signups {
            self.set_notify_signups(v);
        }
        if let Some(v) = update.enable_backend_access {
            self.set_enable_backend_access(v);
        }
        if let Some(v) = update.password_min_length {
            self.set_password_min_length(v);
        }
        if let Some(v) = update.password_max_length {
            self.set_password_max_length(v);
        }
        if let Some(v) = update.password_strength_threshold {
            self.set_password_strength_threshold(v);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub allow_registration: bool,
    pub require_verification: bool,
    pub require_approval: bool,
    pub require_terms_acceptance: bool,
    pub notify_signups: bool,
    pub enable_backend_access: bool,
    pub password_min_length: usize,
    pub password_max_length: usize,
    pub password_strength_threshold: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub allow_registration: Option<bool>,
    pub require_verification: Option<bool>,
    pub require_approval: Option<bool>,
    pub require_terms_acceptance: Option<bool>,
    pub notify_signups: Option<bool>,
    pub enable_backend_access: Option<bool>,
    pub password_min_length: Option<usize>,
    pub password_max_length: Option<usize>,
    pub password_strength_threshold: Option<u8>,
}

/// Check a requested username against the reserved list, case-insensitively.
pub fn is_reserved_username(username: &str) -> bool {
    RESERVED_USERNAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(username))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = UserSettings::new();
        assert!(settings.allow_registration());
        assert!(settings.require_verification());
        assert!(!settings.require_approval());
        assert!(!settings.enable_backend_access());
    }

    #[test]
    fn apply_only_touches_provided_fields() {
        let settings = UserSettings::new();
        settings.apply(&SettingsUpdate {
            require_approval: Some(true),
            ..Default::default()
        });
        assert!(settings.require_approval());
        assert!(settings.allow_registration());
    }

    #[test]
    fn password_bounds_are_adjustable() {
        let settings = UserSettings::new();
        assert_eq!(settings.password_min_length(), 8);
        settings.apply(&SettingsUpdate {
            password_min_length: Some(4),
            password_strength_threshold: Some(0),
            ..Default::default()
        });
        assert_eq!(settings.password_min_length(), 4);
        assert_eq!(settings.password_strength_threshold(), 0);
        assert_eq!(settings.snapshot().password_max_length, 255);
    }

    #[test]
    fn reserved_usernames_are_case_insensitive() {
        assert!(is_reserved_username("CURRENT"));
        assert!(is_reserved_username("deleted"));
        assert!(!is_reserved_username("alice"));
    }
}
