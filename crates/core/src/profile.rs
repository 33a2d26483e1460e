//! Extensible per-user profile data.
//!
//! Host applications register a [`ProfileCodec`] per profile key; profile
//! payloads submitted through the user endpoints are validated by the
//! matching codec before being stored.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AuthError, AuthResult};

pub trait ProfileCodec: Send + Sync {
    /// Key under which this profile section is stored, e.g. `shipping`.
    fn key(&self) -> &'static str;

    /// Validate a submitted value before it is persisted.
    fn validate(&self, value: &serde_json::Value) -> AuthResult<()>;
}

#[derive(Default)]
pub struct ProfileRegistry {
    codecs: HashMap<&'static str, Arc<dyn ProfileCodec>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn ProfileCodec>) -> AuthResult<()> {
        let key = codec.key();
        if self.codecs.contains_key(key) {
            return Err(AuthError::Configuration(format!(
                "duplicate profile codec for key '{key}'"
            )));
        }
        self.codecs.insert(key, codec);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn ProfileCodec>> {
        self.codecs.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShippingCodec;

    impl ProfileCodec for ShippingCodec {
        fn key(&self) -> &'static str {
            "shipping"
        }

        fn validate(&self, value: &serde_json::Value) -> AuthResult<()> {
            if value.get("address").and_then(|v| v.as_str()).is_none() {
                return Err(AuthError::field("address", "address is required"));
            }
            Ok(())
        }
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut registry = ProfileRegistry::new();
        registry.register(Arc::new(ShippingCodec)).unwrap();
        assert!(registry.register(Arc::new(ShippingCodec)).is_err());
    }

    #[test]
    fn codec_validates_payloads() {
        let mut registry = ProfileRegistry::new();
        registry.register(Arc::new(ShippingCodec)).unwrap();

        let codec = registry.get("shipping").unwrap();
        assert!(codec
            .validate(&serde_json::json!({ "address": "Main St 1" }))
            .is_ok());
        assert!(codec.validate(&serde_json::json!({})).is_err());
    }
}
