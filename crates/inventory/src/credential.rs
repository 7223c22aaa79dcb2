//! Password hashing.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::InventoryError;

/// Turns plaintext passwords into stored credentials and checks them.
///
/// Implementations are CPU-bound; callers run them on a blocking thread.
pub trait CredentialHasher: Send + Sync {
    /// Hashes `password` into a PHC string.
    fn hash(&self, password: &str) -> Result<String, InventoryError>;

    /// Checks `password` against a PHC string produced by [`CredentialHasher::hash`].
    fn verify(&self, password: &str, hash: &str) -> Result<bool, InventoryError>;
}

/// Argon2id with default parameters and a random salt per password.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, InventoryError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| InventoryError::Credential(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, InventoryError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| InventoryError::Credential(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
