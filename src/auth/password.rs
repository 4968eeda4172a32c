//! Salted, iterated password hashing (PBKDF2-HMAC-SHA256).
//!
//! Raw passwords never reach the database: only the derived hash and the salt
//! used to produce it are stored, and verification re-derives with the stored
//! salt before comparing in constant time.

use base64ct::{Base64, Encoding};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

use super::error::AuthError;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Derived hash plus the salt that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedSecret {
    pub hash: [u8; HASH_LEN],
    pub salt: [u8; SALT_LEN],
}

impl HashedSecret {
    #[must_use]
    pub fn hash_base64(&self) -> String {
        Base64::encode_string(&self.hash)
    }

    #[must_use]
    pub fn salt_base64(&self) -> String {
        Base64::encode_string(&self.salt)
    }
}

impl std::fmt::Debug for HashedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashedSecret")
            .field("hash", &"***")
            .field("salt", &self.salt_base64())
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    #[must_use]
    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a secret with a fresh random salt.
    ///
    /// # Errors
    /// Returns [`AuthError::Randomness`] if the OS random source fails; there is
    /// no weaker fallback.
    pub fn hash(&self, secret: &str) -> Result<HashedSecret, AuthError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| AuthError::Randomness)?;
        Ok(self.hash_with_salt(secret, &salt))
    }

    /// Deterministic derivation with a caller supplied salt.
    #[must_use]
    pub fn hash_with_salt(&self, secret: &str, salt: &[u8; SALT_LEN]) -> HashedSecret {
        let mut hash = [0u8; HASH_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, self.iterations, &mut hash);
        HashedSecret { hash, salt: *salt }
    }

    /// Re-derive with the stored salt and compare against the stored hash.
    ///
    /// Stored values of the wrong length never verify.
    #[must_use]
    pub fn verify(&self, secret: &str, stored_hash: &[u8], stored_salt: &[u8]) -> bool {
        let Ok(salt) = <[u8; SALT_LEN]>::try_from(stored_salt) else {
            return false;
        };
        let derived = self.hash_with_salt(secret, &salt);
        constant_time_eq(&derived.hash, stored_hash)
    }

    /// Burn one derivation so a missing account costs as much as a wrong password.
    pub fn dummy_verify(&self, secret: &str) {
        let _ = self.hash_with_salt(secret, &[0u8; SALT_LEN]);
    }
}

/// Checks a presented secret against stored material.
pub trait SecretVerifier {
    fn verify(&self, secret: &str, stored_hash: &[u8], stored_salt: &[u8]) -> bool;

    /// Spend the cost of one verification without stored material.
    fn dummy_verify(&self, secret: &str);
}

impl SecretVerifier for PasswordHasher {
    fn verify(&self, secret: &str, stored_hash: &[u8], stored_salt: &[u8]) -> bool {
        Self::verify(self, secret, stored_hash, stored_salt)
    }

    fn dummy_verify(&self, secret: &str) {
        Self::dummy_verify(self, secret);
    }
}

/// Length-checked comparison whose timing does not depend on where bytes differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fewer rounds keep the suite fast; the derivation is otherwise identical.
    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn verify_accepts_original_secret() -> Result<(), AuthError> {
        let hasher = hasher();
        let hashed = hasher.hash("correct horse")?;
        assert!(hasher.verify("correct horse", &hashed.hash, &hashed.salt));
        Ok(())
    }

    #[test]
    fn verify_rejects_other_secret() -> Result<(), AuthError> {
        let hasher = hasher();
        let hashed = hasher.hash("correct horse")?;
        assert!(!hasher.verify("battery staple", &hashed.hash, &hashed.salt));
        Ok(())
    }

    #[test]
    fn hashing_twice_uses_fresh_salts() -> Result<(), AuthError> {
        let hasher = hasher();
        let first = hasher.hash("secret")?;
        let second = hasher.hash("secret")?;
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        Ok(())
    }

    #[test]
    fn same_salt_is_deterministic() {
        let hasher = hasher();
        let salt = [7u8; SALT_LEN];
        assert_eq!(
            hasher.hash_with_salt("secret", &salt),
            hasher.hash_with_salt("secret", &salt)
        );
    }

    #[test]
    fn empty_secret_is_accepted() -> Result<(), AuthError> {
        let hasher = hasher();
        let hashed = hasher.hash("")?;
        assert!(hasher.verify("", &hashed.hash, &hashed.salt));
        assert!(!hasher.verify(" ", &hashed.hash, &hashed.salt));
        Ok(())
    }

    #[test]
    fn verify_rejects_malformed_stored_values() -> Result<(), AuthError> {
        let hasher = hasher();
        let hashed = hasher.hash("secret")?;
        assert!(!hasher.verify("secret", &hashed.hash[..16], &hashed.salt));
        assert!(!hasher.verify("secret", &hashed.hash, &hashed.salt[..8]));
        Ok(())
    }

    #[test]
    fn derived_lengths_are_fixed() {
        let hashed = hasher().hash_with_salt("secret", &[1u8; SALT_LEN]);
        assert_eq!(hashed.hash.len(), HASH_LEN);
        assert_eq!(hashed.salt.len(), SALT_LEN);
    }

    #[test]
    fn debug_output_hides_hash() {
        let hashed = hasher().hash_with_salt("secret", &[1u8; SALT_LEN]);
        let rendered = format!("{hashed:?}");
        assert!(rendered.contains("***"));
        assert!(!rendered.contains(&hashed.hash_base64()));
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
