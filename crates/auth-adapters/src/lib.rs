//! # auth-adapters
//!
//! Email/password implementation of the `AuthProvider` port.
//!
//! Passwords are hashed with Argon2id. Sessions are bearer tokens issued by
//! a `TokenIssuer`: signed JWTs with the `auth-jwt` feature, or opaque
//! random tokens held in memory.

pub mod lockout;
pub mod password;
pub mod provider;
pub mod tokens;

pub use lockout::{AttemptTracker, LockoutPolicy};
pub use provider::PasswordAuthProvider;
pub use tokens::{OpaqueTokens, TokenIssuer};

#[cfg(feature = "auth-jwt")]
pub use tokens::JwtTokens;
