//! Password hashing and verification (bcrypt, salted).

use crate::error::{AuthError, AuthResult};

/// Hash a password with a fresh salt at the default bcrypt cost.
pub fn hash_password(plain: &str) -> AuthResult<String> {
    hash_password_with_cost(plain, bcrypt::DEFAULT_COST)
}

/// Hash with an explicit cost; tests use `bcrypt`'s minimum to stay fast.
pub fn hash_password_with_cost(plain: &str, cost: u32) -> AuthResult<String> {
    bcrypt::hash(plain, cost).map_err(|e| AuthError::PasswordHash(e.to_string()))
}

/// Compare a stored hash against a plaintext password.
///
/// A hash that cannot be parsed never verifies.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    bcrypt::verify(plain, hash).unwrap_or(false)
}
