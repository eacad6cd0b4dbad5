use crate::auth::Role;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STOREHOUSE_CONFIG";

/// Default bearer token lifetime: 8 hours (seconds).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 8 * 60 * 60;

// ── Top-level config ────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    /// Directory the config file was loaded from; relative paths resolve against it.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Allow binding to a non-loopback address.
    pub allow_public_bind: bool,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            allow_public_bind: false,
            max_body_bytes: 65_536,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`.
    pub db_path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "storehouse.db".into(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

/// What the authorizer does with an authenticated identity missing from the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlistedIdentity {
    /// Treat as the lowest role.
    #[default]
    Reader,
    /// Deny every gated operation.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens. Generated per process when unset.
    pub token_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub unlisted_identity: UnlistedIdentity,
    /// Provision alice/bob/admin demo accounts when no users are configured.
    pub seed_demo_users: bool,
    pub users: Vec<UserEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            unlisted_identity: UnlistedIdentity::Reader,
            seed_demo_users: false,
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    /// PHC string, see `storehouse hash-password`.
    pub password_hash: String,
    pub role: Role,
}

// ── Loading ─────────────────────────────────────────────────────

impl Config {
    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load from an explicit path, `STOREHOUSE_CONFIG`, or the platform config dir,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                let mut parsed = Self::from_toml_str(&raw)
                    .with_context(|| format!("In config file: {}", p.display()))?;
                parsed.config_dir = p.parent().map(Path::to_path_buf);
                tracing::info!(path = %p.display(), "Loaded config file");
                parsed
            }
            Some(ref p) if explicit.is_some() => {
                bail!("Config file not found: {}", p.display());
            }
            _ => {
                tracing::info!("No config file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `STOREHOUSE_*` overrides. The lookup is injected so tests stay hermetic.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("STOREHOUSE_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("STOREHOUSE_PORT") {
            self.gateway.port = port
                .trim()
                .parse()
                .with_context(|| format!("STOREHOUSE_PORT is not a valid port: {port}"))?;
        }
        if let Some(path) = lookup("STOREHOUSE_DB_PATH") {
            self.store.db_path = path;
        }
        if let Some(secret) = lookup("STOREHOUSE_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Some(ttl) = lookup("STOREHOUSE_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = ttl
                .trim()
                .parse()
                .with_context(|| format!("STOREHOUSE_TOKEN_TTL_SECS is not a number: {ttl}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            bail!("gateway.host cannot be empty");
        }
        if self.gateway.max_body_bytes == 0 {
            bail!("gateway.max_body_bytes must be greater than zero");
        }
        if self.store.db_path.trim().is_empty() {
            bail!("store.db_path cannot be empty");
        }
        if self.store.pool_size == 0 {
            bail!("store.pool_size must be at least 1");
        }
        if self.gateway.request_timeout_secs == 0 {
            bail!("gateway.request_timeout_secs must be greater than zero");
        }
        if self.auth.token_ttl_secs == 0 {
            bail!("auth.token_ttl_secs must be greater than zero");
        }
        if let Some(ref secret) = self.auth.token_secret {
            if secret.trim().is_empty() {
                bail!("auth.token_secret cannot be empty when set");
            }
        }

        let mut seen = HashSet::new();
        for user in &self.auth.users {
            if user.username.trim().is_empty() {
                bail!("auth.users: username cannot be empty");
            }
            if !seen.insert(user.username.as_str()) {
                bail!("auth.users: duplicate username '{}'", user.username);
            }
            crate::auth::password::check_phc(&user.password_hash).with_context(|| {
                format!("auth.users: malformed password_hash for '{}'", user.username)
            })?;
        }
        Ok(())
    }

    /// Database location with relative paths resolved against the config file dir.
    pub fn resolved_db_path(&self) -> PathBuf {
        let raw = Path::new(&self.store.db_path);
        if self.store.db_path == ":memory:" || raw.is_absolute() {
            return raw.to_path_buf();
        }
        match self.config_dir {
            Some(ref dir) => dir.join(raw),
            None => raw.to_path_buf(),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "storehouse", "storehouse")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
