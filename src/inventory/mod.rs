//! Stores and their IPv4 items, persisted in SQLite.
//!
//! A store owns its items: deleting the store deletes them through the
//! `ON DELETE CASCADE` foreign key. Store names are unique (case-sensitive);
//! the `UNIQUE` constraint is the final backstop behind the in-transaction check.

pub mod store;
pub mod validate;

pub use store::{InventoryStore, Item, Store};
pub use validate::FieldErrors;

/// Inventory failures surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("store not found")]
    StoreNotFound(String),

    #[error("{message}")]
    Conflict { name: String, message: &'static str },

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database directory error: {0}")]
    Io(#[from] std::io::Error),
}

impl InventoryError {
    pub(crate) fn store_exists(name: &str) -> Self {
        Self::Conflict {
            name: name.to_string(),
            message: "store exists",
        }
    }

    pub(crate) fn rename_taken(name: &str) -> Self {
        Self::Conflict {
            name: name.to_string(),
            message: "a store with the new name already exists",
        }
    }
}
