//! Configuration
//!
//! Environment-aware configuration loading: a base YAML file, an optional
//! per-environment overlay, then `PROVISION__*` environment variables on top.
//! Missing files are fine; every field has a workable default for local
//! development against the mock adapter.

use std::env;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which [`crate::csp::CloudProvider`] implementation to wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Mock,
    Azure,
}

/// Inline retry budget for transient adapter errors during a stage call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per stage call, the first included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool: u32,
}

fn default_database_url() -> String {
    "postgresql://localhost/provision_development".to_string()
}

fn default_pool_size() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
            pool: default_pool_size(),
        }
    }
}

/// Knobs for the mock adapter's failure simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockAdapterConfig {
    pub with_delay: bool,
    pub with_authorization: bool,
    pub connection_failure_pct: u8,
    pub server_failure_pct: u8,
    pub authorization_failure_pct: u8,
}

/// Endpoints and credentials for the real vendor adapter. Secrets arrive via
/// environment overrides, never from checked-in YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureAdapterConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub vault_url: String,
    pub login_endpoint: String,
    pub management_endpoint: String,
    pub graph_endpoint: String,
    pub login_url: String,
    pub timeout_seconds: u64,
}

impl Default for AzureAdapterConfig {
    fn default() -> Self {
        AzureAdapterConfig {
            client_id: String::new(),
            client_secret: String::new(),
            tenant_id: String::new(),
            vault_url: String::new(),
            login_endpoint: "https://login.microsoftonline.com".to_string(),
            management_endpoint: "https://management.azure.com".to_string(),
            graph_endpoint: "https://graph.windows.net".to_string(),
            login_url: "https://portal.azure.com".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub environment: String,
    pub adapter: AdapterKind,
    pub retry: RetryPolicy,
    pub database: DatabaseConfig,
    pub mock: MockAdapterConfig,
    pub azure: AzureAdapterConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        ProvisionConfig {
            environment: "development".to_string(),
            adapter: AdapterKind::Mock,
            retry: RetryPolicy::default(),
            database: DatabaseConfig::default(),
            mock: MockAdapterConfig::default(),
            azure: AzureAdapterConfig::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load with environment auto-detection and the default `config/`
    /// directory.
    pub fn load() -> ConfigResult<ProvisionConfig> {
        Self::load_from_directory(Path::new("config"), &Self::detect_environment())
    }

    /// Load `base.yaml` then `<environment>.yaml` from `config_dir`, both
    /// optional, then apply `PROVISION__*` environment variable overrides
    /// (double underscore separates nesting, e.g.
    /// `PROVISION__DATABASE__URL`).
    pub fn load_from_directory(
        config_dir: &Path,
        environment: &str,
    ) -> ConfigResult<ProvisionConfig> {
        debug!(
            environment,
            config_dir = %config_dir.display(),
            "loading configuration"
        );
        let base: PathBuf = config_dir.join("base.yaml");
        let overlay: PathBuf = config_dir.join(format!("{environment}.yaml"));

        let mut config: ProvisionConfig = Config::builder()
            .add_source(File::from(base).required(false))
            .add_source(File::from(overlay).required(false))
            .add_source(Environment::with_prefix("PROVISION").separator("__"))
            .build()?
            .try_deserialize()?;
        config.environment = environment.to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn detect_environment() -> String {
        env::var("PROVISION_ENV").unwrap_or_else(|_| "development".to_string())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.adapter == AdapterKind::Azure {
            for (name, value) in [
                ("azure.client_id", &self.azure.client_id),
                ("azure.client_secret", &self.azure.client_secret),
                ("azure.tenant_id", &self.azure.tenant_id),
                ("azure.vault_url", &self.azure.vault_url),
            ] {
                if value.is_empty() {
                    return Err(ConfigError::Invalid(format!("{name} must be set")));
                }
            }
        }
        for pct in [
            self.mock.connection_failure_pct,
            self.mock.server_failure_pct,
            self.mock.authorization_failure_pct,
        ] {
            if pct > 100 {
                return Err(ConfigError::Invalid(
                    "mock failure percentages must be 0-100".to_string(),
                ));
            }
        }
        Ok(())
    }
}
