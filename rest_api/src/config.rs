// rest_api/src/config.rs

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File};
use log::info;
use serde::Deserialize;

use storage::EngineType;

pub const DEFAULT_CONFIG_FILE: &str = "clinic_api.yaml";
pub const CONFIG_PATH_ENV: &str = "CLINIC_API_CONFIG";
pub const ENV_PREFIX: &str = "CLINIC_API";
const PLACEHOLDER_SECRET: &str = "change-me-in-production";

/// Represents the `server:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Represents the `storage:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// `inmemory` or `sled`.
    pub engine_type: String,
    pub data_directory: PathBuf,
}

impl StorageConfig {
    pub fn engine(&self) -> Result<EngineType> {
        EngineType::from_str(&self.engine_type)
            .map_err(|e| anyhow!("invalid storage.engine_type '{}': {}", self.engine_type, e))
    }
}

/// Represents the `auth:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: u64,
    pub bcrypt_cost: u32,
}

/// Represents the optional `admin:` section: the account created at startup
/// if no user with that email exists yet.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
    #[serde(default = "default_admin_phone")]
    pub phone_number: String,
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

fn default_admin_phone() -> String {
    "000-0000".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn is_production(&self) -> bool {
        *self == RunMode::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub environment: RunMode,
    pub admin: Option<AdminConfig>,
}

impl AppConfig {
    /// Built-in defaults only; what the router tests run with.
    pub fn defaults() -> Result<Self> {
        with_defaults(Config::builder())?
            .build()
            .context("Failed to build default configuration")?
            .try_deserialize()
            .context("Failed to deserialize default configuration")
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 5187)?
        .set_default("storage.engine_type", "sled")?
        .set_default("storage.data_directory", "./data/clinic")?
        .set_default("auth.jwt_secret", PLACEHOLDER_SECRET)?
        .set_default("auth.token_ttl_hours", 720)?
        .set_default("auth.bcrypt_cost", 10)?
        .set_default("environment", "development")?)
}

/// Loads the configuration: defaults, then the YAML file (`clinic_api.yaml`
/// or the path in `CLINIC_API_CONFIG`) if present, then `CLINIC_API__*`
/// environment variables, e.g. `CLINIC_API__SERVER__PORT=8080`.
pub fn load_config() -> Result<AppConfig> {
    let path = env::var(CONFIG_PATH_ENV).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let mut builder = with_defaults(Config::builder())?;
    if path.exists() {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path.to_path_buf()));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config: AppConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    if config.environment.is_production() && config.auth.jwt_secret == PLACEHOLDER_SECRET {
        return Err(anyhow!("auth.jwt_secret must be set when running in production"));
    }
    config.storage.engine()?;
    Ok(config)
}
