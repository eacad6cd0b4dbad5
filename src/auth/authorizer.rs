use super::directory::{Role, UserDirectory};
use super::AuthError;
use crate::config::UnlistedIdentity;
use std::sync::Arc;

/// Caller that passed both authentication and the role gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub username: String,
    pub role: Role,
}

/// Pure role gate. Re-resolves the role from the directory on every call.
pub struct Authorizer {
    directory: Arc<dyn UserDirectory>,
    unlisted: UnlistedIdentity,
}

impl Authorizer {
    pub fn new(directory: Arc<dyn UserDirectory>, unlisted: UnlistedIdentity) -> Self {
        Self {
            directory,
            unlisted,
        }
    }

    /// Role for an authenticated username, per the unlisted-identity policy.
    pub fn resolve_role(&self, username: &str) -> Option<Role> {
        match self.directory.lookup(username) {
            Some(credential) => Some(credential.role),
            None => match self.unlisted {
                UnlistedIdentity::Reader => Some(Role::Reader),
                UnlistedIdentity::Reject => None,
            },
        }
    }

    /// Allow iff the caller's rank is at least `required`'s.
    pub fn authorize(&self, username: &str, required: Role) -> Result<Caller, AuthError> {
        let Some(role) = self.resolve_role(username) else {
            tracing::warn!(username, required = %required, "Unlisted identity rejected");
            return Err(AuthError::Forbidden {
                username: username.to_string(),
                required,
                actual: None,
            });
        };

        if !role.satisfies(required) {
            tracing::warn!(username, role = %role, required = %required, "Insufficient role");
            return Err(AuthError::Forbidden {
                username: username.to_string(),
                required,
                actual: Some(role),
            });
        }

        Ok(Caller {
            username: username.to_string(),
            role,
        })
    }
}
