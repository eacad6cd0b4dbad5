//! Storehouse: a role-gated HTTP inventory of named stores and their IPv4 items.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inventory;

pub use config::Config;
pub use error::ApiError;
