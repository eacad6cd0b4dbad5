use super::directory::{Role, UserDirectory};
use super::password;
use super::token::{TokenClaims, TokenSigner};
use super::AuthError;
use std::sync::Arc;

/// Result of a successful login exchange.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub access_token: String,
    pub username: String,
    /// Informational only; every request re-resolves the role server-side.
    pub role: Role,
    pub expires_at: u64,
}

/// Identity proven by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub expires_at: u64,
}

/// Verifies passwords at login and bearer tokens afterwards.
pub struct Authenticator {
    directory: Arc<dyn UserDirectory>,
    signer: TokenSigner,
}

impl Authenticator {
    pub fn new(directory: Arc<dyn UserDirectory>, signer: TokenSigner) -> Self {
        Self { directory, signer }
    }

    /// Exchange username + password for a token.
    ///
    /// Unknown user and wrong password fail identically (same error, same hashing work).
    pub fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let Some(credential) = self.directory.lookup(username) else {
            password::verify_against_dummy(password);
            tracing::warn!(username, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(&credential.password_hash, password) {
            tracing::warn!(username, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let (access_token, claims) = self.signer.issue(username);
        tracing::info!(username, role = %credential.role, "Login succeeded");
        Ok(LoginGrant {
            access_token,
            username: claims.sub,
            role: credential.role,
            expires_at: claims.exp,
        })
    }

    /// Verify a bearer token's signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.signer
            .verify(token)
            .map(identity_from)
            .map_err(|rejection| AuthError::Unauthenticated(rejection.as_str()))
    }
}

fn identity_from(claims: TokenClaims) -> Identity {
    Identity {
        username: claims.sub,
        expires_at: claims.exp,
    }
}
