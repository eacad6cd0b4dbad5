//! Credential directory: who exists, their password hash, and their role.

use crate::config::UserEntry;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Role hierarchy. Ordering follows rank: reader < writer < admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
    Admin,
}

impl Role {
    pub fn rank(self) -> u8 {
        match self {
            Self::Reader => 10,
            Self::Writer => 20,
            Self::Admin => 30,
        }
    }

    /// True when this role meets or exceeds `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Admin => "admin",
        }
    }

    pub const ALL: [Role; 3] = [Role::Reader, Role::Writer, Role::Admin];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub password_hash: String,
    pub role: Role,
}

/// Lookup capability for users. Swappable for an external directory.
pub trait UserDirectory: Send + Sync {
    fn lookup(&self, username: &str) -> Option<Credential>;
}

/// Directory fixed at startup from configuration.
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, Credential>,
}

impl StaticUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[UserEntry]) -> Self {
        let mut dir = Self::new();
        for entry in entries {
            dir.insert(&entry.username, entry.password_hash.clone(), entry.role);
        }
        dir
    }

    /// Demo accounts alice/bob/admin with passwords readerpass/writerpass/adminpass.
    pub fn with_demo_users() -> Result<Self> {
        let mut dir = Self::new();
        for (username, password, role) in [
            ("alice", "readerpass", Role::Reader),
            ("bob", "writerpass", Role::Writer),
            ("admin", "adminpass", Role::Admin),
        ] {
            dir.insert(username, super::password::hash_password(password)?, role);
        }
        Ok(dir)
    }

    /// Add or replace a user. Usernames are case-sensitive.
    pub fn insert(&mut self, username: &str, password_hash: String, role: Role) {
        self.users.insert(
            username.to_string(),
            Credential {
                password_hash,
                role,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserDirectory for StaticUserDirectory {
    fn lookup(&self, username: &str) -> Option<Credential> {
        self.users.get(username).cloned()
    }
}
