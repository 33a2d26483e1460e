//! Password hashing and verification primitives.
//!
//! Lives in `userhub-core` so that any crate in the workspace can reuse
//! these without duplicating logic. Policy checks (length, strength) are
//! in [`crate::policy`].

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHasher as Argon2PasswordHasher, PasswordVerifier};
use async_trait::async_trait;

use crate::error::{AuthError, AuthResult};

/// Custom password hasher trait for pluggable password hashing strategies.
///
/// When provided, this overrides the default Argon2-based hashing.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> AuthResult<String>;
    /// Returns `true` if the password matches the hash.
    async fn verify(&self, hash: &str, password: &str) -> AuthResult<bool>;
}

/// Hash `password` using the custom `hasher` (if provided) or the default
/// Argon2 algorithm.
pub async fn hash_password(
    hasher: Option<&Arc<dyn PasswordHasher>>,
    password: &str,
) -> AuthResult<String> {
    if let Some(hasher) = hasher {
        return hasher.hash(password).await;
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(format!("Failed to hash password: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verify `password` against `hash`. Returns `Ok(())` on match, or
/// `Err(AuthError::InvalidCredentials)` on mismatch.
pub async fn verify_password(
    hasher: Option<&Arc<dyn PasswordHasher>>,
    password: &str,
    hash: &str,
) -> AuthResult<()> {
    if let Some(hasher) = hasher {
        return hasher.verify(hash, password).await.and_then(|valid| {
            if valid {
                Ok(())
            } else {
                Err(AuthError::InvalidCredentials)
            }
        });
    }

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswordHash(format!("Invalid password hash: {}", e)))?;

    let argon2 = Argon2::default();
    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify_round_trip() {
        let hash = hash_password(None, "correct horse battery").await.unwrap();
        assert!(verify_password(None, "correct horse battery", &hash)
            .await
            .is_ok());
        assert!(matches!(
            verify_password(None, "wrong", &hash).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        let err = verify_password(None, "pw", "not-a-phc-string")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PasswordHash(_)));
    }
}
