// src/config.rs
//! Typed service configuration.
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. Optional TOML file (`registry.toml`, or the path in `REGISTRY_CONFIG`)
//! 3. Environment variables prefixed `REGISTRY`, nested with `__`
//!    (e.g. `REGISTRY__SERVER__PORT=8080`, `REGISTRY__AUTH__JWT_SECRET=...`)
//!
//! A `.env` file is loaded into the environment by `main` before this runs.

use crate::models::account::account_key;
use crate::models::identity::Role;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default configuration file name, looked up relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "registry.toml";

/// Longest access token lifetime accepted: 30 days.
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    /// Issue a few sample certificates into an empty store at startup
    pub seed_demo_data: bool,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build verification links
    pub public_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Snapshot file used by the `file` backend
    pub path: PathBuf,
    /// Registered accounts file used by the `file` backend
    pub accounts_path: PathBuf,
}

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for signing access tokens
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub accounts: Vec<AccountSettings>,
    /// Whether `POST /register` accepts new accounts
    pub allow_registration: bool,
    /// Codes that let an institution register its own account
    #[serde(default)]
    pub institution_codes: Vec<InstitutionCodeSettings>,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("accounts", &self.accounts.len())
            .field("allow_registration", &self.allow_registration)
            .field("institution_codes", &self.institution_codes.len())
            .finish()
    }
}

/// Registration code of one institution.
#[derive(Debug, Clone, Deserialize)]
pub struct InstitutionCodeSettings {
    pub institution: String,
    /// Hex SHA-256 digest of the code
    pub code_sha256: String,
}

/// A login account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSettings {
    pub username: String,
    /// Hex SHA-256 digest of the account password
    pub password_sha256: String,
    pub role: Role,
    /// Required for the institution role
    #[serde(default)]
    pub institution: Option<String>,
}

impl Settings {
    /// Loads settings from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Loads settings with `path` as the (optional) configuration file.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.public_base_url", "http://localhost:3000")?
            .set_default("storage.backend", "memory")?
            .set_default("storage.path", "certificates.json")?
            .set_default("storage.accounts_path", "accounts.json")?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.token_ttl_secs", 3600)?
            .set_default("auth.allow_registration", true)?
            .set_default("seed_demo_data", false)?
            .set_default("log_level", "info")?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("REGISTRY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.jwt_secret must be set (REGISTRY__AUTH__JWT_SECRET)".into(),
            ));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ConfigError::Message(format!(
                "auth.token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        let mut usernames = HashSet::new();
        for account in &self.auth.accounts {
            if !usernames.insert(account_key(&account.username)) {
                return Err(ConfigError::Message(format!(
                    "account '{}' is configured more than once",
                    account.username
                )));
            }
            if account.role == Role::Institution
                && account.institution.as_deref().map_or(true, |i| i.trim().is_empty())
            {
                return Err(ConfigError::Message(format!(
                    "account '{}' has role institution but no institution name",
                    account.username
                )));
            }
            if !is_sha256_hex(&account.password_sha256) {
                return Err(ConfigError::Message(format!(
                    "account '{}' password_sha256 must be a 64-character hex digest",
                    account.username
                )));
            }
        }
        for code in &self.auth.institution_codes {
            if code.institution.trim().is_empty() {
                return Err(ConfigError::Message("institution code without institution name".into()));
            }
            if !is_sha256_hex(&code.code_sha256) {
                return Err(ConfigError::Message(format!(
                    "code_sha256 of '{}' must be a 64-character hex digest",
                    code.institution
                )));
            }
        }
        Ok(())
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid server address: {}", e)))
    }
}

fn is_sha256_hex(value: &str) -> bool {
    hex::decode(value.trim()).map(|d| d.len()) == Ok(32)
}
