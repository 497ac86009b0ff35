//! Credential handling: password hashing and the JWT access/refresh pair.

pub mod jwt;
pub mod password;

pub use jwt::{verify_token, Claims, TokenPair, TokenType};
pub use password::{hash_password, verify_password};

use thiserror::Error;

/// Token and hashing failures. Verification problems deliberately collapse
/// into one variant so callers cannot leak which check failed.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}
