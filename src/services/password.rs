//! Password hashing
//!
//! Passwords are stored as Argon2id PHC strings (algorithm, parameters and a
//! per-password random salt all live in the stored value), so verification
//! needs nothing but the stored hash.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a plaintext password into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {}", e))
}

/// Check a plaintext password against a stored PHC string.
///
/// A mismatch is `Ok(false)`; only a malformed stored hash is an error.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| anyhow!("Invalid password hash: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Failed to verify password: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_is_argon2id_and_salted() {
        let first = hash_password("pancakes").unwrap();
        let second = hash_password("pancakes").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(!first.contains("pancakes"));
    }

    #[test]
    fn test_verify_accepts_only_the_original() {
        let hash = hash_password("s3cret-Рецепт").unwrap();

        assert!(verify_password("s3cret-Рецепт", &hash).unwrap());
        assert!(!verify_password("s3cret-рецепт", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "plain-text-not-a-hash").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_hash_then_verify(password in "[ -~]{1,40}") {
            let hash = hash_password(&password).unwrap();
            prop_assert!(verify_password(&password, &hash).unwrap());
        }
    }
}
