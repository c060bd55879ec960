//! Credential primitives: salted password hashes and signed session tokens.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password};
pub use token::{issue_token, verify_token, AuthError, Claims};
