//! Identity and access control for the inventory gateway.
//!
//! Provides:
//! - A `UserDirectory` capability (static, config-backed by default)
//! - Salted PBKDF2 password hashes in PHC form
//! - Self-contained HMAC-signed bearer tokens (identity + expiry)
//! - A pure role gate over the reader < writer < admin hierarchy
//!
//! ## Design Decisions
//! - Tokens carry no role. The role is looked up again on every request, so
//!   a directory change takes effect without reissuing tokens.
//! - There is no revocation list; a token lives until `exp`.
//! - Bearer tokens are the only credential presentation. HTTP Basic is not accepted.

pub mod authenticator;
pub mod authorizer;
pub mod directory;
pub mod password;
pub mod token;

pub use authenticator::{Authenticator, Identity, LoginGrant};
pub use authorizer::{Authorizer, Caller};
pub use directory::{Credential, Role, StaticUserDirectory, UserDirectory};
pub use token::{TokenClaims, TokenRejection, TokenSigner};

/// Authentication and authorization failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown username or wrong password. One variant for both.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, badly signed or expired bearer token.
    #[error("missing or invalid token: {0}")]
    Unauthenticated(&'static str),

    #[error("user `{username}` lacks role `{required}`")]
    Forbidden {
        username: String,
        required: Role,
        actual: Option<Role>,
    },
}
