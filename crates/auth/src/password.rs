//! Password hashing and comparison.
//!
//! New hashes are Argon2id PHC strings. Comparison also accepts bcrypt hashes
//! (`$2a$`, `$2b$`, `$2y$`) so accounts imported from bcrypt-based systems can
//! still sign in. Both algorithms are CPU-bound, so the work runs on the
//! blocking thread pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher as _, PasswordVerifier as _,
};
use async_trait::async_trait;

use crate::{AuthError, AuthResult};

/// One-way password hashing service.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password for storage.
    async fn hash(&self, plaintext: &str) -> AuthResult<String>;

    /// Compares a plaintext password with a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch and `Err` only when the stored hash
    /// cannot be parsed or the worker fails.
    async fn compare(&self, plaintext: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id hasher that also verifies legacy bcrypt hashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPasswordHasher;

impl DefaultPasswordHasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

fn hash_sync(plaintext: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| AuthError::PasswordHash(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

fn compare_sync(plaintext: &str, hash: &str) -> AuthResult<bool> {
    if is_bcrypt(hash) {
        return bcrypt::verify(plaintext, hash)
            .map_err(|e| AuthError::PasswordHash(format!("Invalid bcrypt hash: {}", e)));
    }

    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswordHash(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

#[async_trait]
impl PasswordHasher for DefaultPasswordHasher {
    async fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || hash_sync(&plaintext))
            .await
            .map_err(|e| AuthError::PasswordHash(format!("Hashing task failed: {}", e)))?
    }

    async fn compare(&self, plaintext: &str, hash: &str) -> AuthResult<bool> {
        let plaintext = plaintext.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || compare_sync(&plaintext, &hash))
            .await
            .map_err(|e| AuthError::PasswordHash(format!("Comparison task failed: {}", e)))?
    }
}
