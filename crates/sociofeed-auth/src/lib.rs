//! Credential primitives: password hashing and signed, purpose-scoped tokens.
//!
//! Nothing here touches the environment or the database. Secrets and
//! lifetimes arrive through [`TokenConfig`], so every function is testable
//! with fixed inputs.

pub mod password;
pub mod tokens;

pub use password::{PasswordError, hash_password, verify_password};
pub use tokens::{TokenConfig, TokenError, TokenKind, TokenPair, TokenService, TokenSettings};
