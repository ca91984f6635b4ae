//! Host configuration and typed module configuration access.
//!
//! Loading is layered: defaults, then an optional YAML file, then environment
//! variables under a caller-chosen prefix (`PREFIX__SERVER__HTTP_BIND_ADDR=...`).
//!
//! Module sections live under `modules.<name>.config` and are extracted either
//! leniently (`module_config_or_default`) or strictly (`module_config_required`).

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Configuration error for typed config operations
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("module '{module}' not found")]
    ModuleNotFound { module: String },
    #[error("module '{module}' config must be an object")]
    InvalidModuleStructure { module: String },
    #[error("missing 'config' section in module '{module}'")]
    MissingConfigSection { module: String },
    #[error("invalid config for module '{module}': {source}")]
    InvalidConfig {
        module: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

/// Top-level configuration of a host process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    /// Per-module sections: `modules.<name> = { config: ... }`.
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub grpc_bind_addr: SocketAddr,
    pub http_bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_bind_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            http_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8087)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset, e.g. `info` or `cookie_dispenser=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Static bearer tokens mapped to caller emails.
    pub tokens: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// sea-orm connection string, e.g. `sqlite://cookies.db?mode=rwc`.
    pub dsn: String,
    /// Delay between connection attempts while the database is unreachable.
    pub retry_interval_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: "sqlite::memory:".to_owned(),
            retry_interval_ms: 2_000,
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults, YAML file, environment variables.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or the merged config cannot be extracted.
    pub fn load(config_path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Yaml},
        };

        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = config_path {
            ensure!(
                path.is_file(),
                "config file does not exist: {}",
                path.to_string_lossy()
            );
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(env_prefix).split("__"));

        figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_owned())
    }
}

impl ConfigProvider for AppConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.modules.get(module_name)
    }
}

/// Lenient configuration loader that falls back to defaults.
///
/// - module missing, not an object, or without a `config` field: `Ok(T::default())`
/// - `config` present but invalid: `Err(ConfigError::InvalidConfig)`
///
/// # Errors
/// Returns `ConfigError::InvalidConfig` if the config section exists but cannot be deserialized.
pub fn module_config_or_default<T: DeserializeOwned + Default>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    let Some(config_section) = provider
        .get_module_config(module_name)
        .and_then(serde_json::Value::as_object)
        .and_then(|obj| obj.get("config"))
    else {
        return Ok(T::default());
    };

    serde_json::from_value(config_section.clone()).map_err(|e| ConfigError::InvalidConfig {
        module: module_name.to_owned(),
        source: e,
    })
}

/// Strict configuration loader that requires configuration to be present.
///
/// # Errors
/// Returns `ConfigError` if the module is not found, has invalid structure, or config is invalid.
pub fn module_config_required<T: DeserializeOwned>(
    provider: &dyn ConfigProvider,
    module_name: &str,
) -> Result<T, ConfigError> {
    let module_raw =
        provider
            .get_module_config(module_name)
            .ok_or_else(|| ConfigError::ModuleNotFound {
                module: module_name.to_owned(),
            })?;

    let obj = module_raw
        .as_object()
        .ok_or_else(|| ConfigError::InvalidModuleStructure {
            module: module_name.to_owned(),
        })?;

    let config_section = obj
        .get("config")
        .ok_or_else(|| ConfigError::MissingConfigSection {
            module: module_name.to_owned(),
        })?;

    serde_json::from_value(config_section.clone()).map_err(|e| ConfigError::InvalidConfig {
        module: module_name.to_owned(),
        source: e,
    })
}
