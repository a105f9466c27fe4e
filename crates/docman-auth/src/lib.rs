//! Docman Authentication and Authorization
//!
//! This crate provides JWT access/refresh token pairs, argon2 password
//! hashing and the access and master guards for Docman.

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use error::AuthError;
pub use jwt::{Claims, JwtManager, TokenKind, TokenPair};
pub use middleware::{AuthUser, auth_guard, authenticate, master_guard};
pub use password::{PasswordManager, PasswordParams};
