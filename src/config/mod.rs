pub mod schema;

pub use schema::{
    AuthConfig, Config, GatewayConfig, StoreConfig, UnlistedIdentity, UserEntry,
    DEFAULT_TOKEN_TTL_SECS,
};
