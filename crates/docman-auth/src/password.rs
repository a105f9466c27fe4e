//! Password hashing with argon2id

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use tracing::warn;

use crate::error::AuthError;

/// Argon2 cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Hashes and verifies passwords with a fixed argon2id configuration
#[derive(Clone)]
pub struct PasswordManager {
    argon2: Argon2<'static>,
    /// Verified against when the login handle matches no user, so both
    /// paths spend the same time hashing
    dummy_hash: String,
}

impl PasswordManager {
    /// Create a manager; fails if the cost parameters are out of range
    pub fn new(params: PasswordParams) -> Result<Self, AuthError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, "docman-dummy-password")?;

        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, plain: &str) -> Result<String, AuthError> {
        hash_with(&self.argon2, plain)
    }

    /// Check a plaintext password against a stored hash
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash).map_err(|_| {
            warn!("Stored password hash could not be parsed");
            AuthError::MalformedHash
        })?;

        match self.argon2.verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(AuthError::MalformedHash),
        }
    }

    /// Verify against `hash` when a user was found, otherwise burn the same
    /// work against the dummy hash and report a mismatch
    pub fn verify_or_dummy(&self, plain: &str, hash: Option<&str>) -> Result<bool, AuthError> {
        match hash {
            Some(hash) => self.verify(plain, hash),
            None => {
                let _ = self.verify(plain, &self.dummy_hash);
                Ok(false)
            }
        }
    }
}

fn hash_with(argon2: &Argon2<'_>, plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}
