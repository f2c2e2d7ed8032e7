//! Configuration loading
//!
//! Settings come from a TOML file overlaid by `ASSOCNET__SECTION__KEY`
//! environment variables. The auth section has no defaults for its required
//! keys; [`Config::auth_settings`] refuses to build settings without them.

use anyhow::{Context, Result, bail};
use assocnet_auth::{AuthSettings, JwtSettings, RotationPolicy};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin, method and header
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cors_permissive: false,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_key: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub access_token_expiration_minutes: Option<i64>,
    pub refresh_token_expiration_days: Option<i64>,
    #[serde(default)]
    pub refresh_token_rotation: RotationPolicy,
    #[serde(default = "default_roles")]
    pub default_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_key: None,
            issuer: None,
            audience: None,
            access_token_expiration_minutes: None,
            refresh_token_expiration_days: None,
            refresh_token_rotation: RotationPolicy::default(),
            default_roles: default_roles(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> String {
    "./data/assocnet.db".to_string()
}

fn default_roles() -> Vec<String> {
    vec!["user".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn environment() -> Environment {
    Environment::with_prefix("ASSOCNET")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("auth.default_roles")
}

impl Config {
    /// Load configuration from a TOML file and the process environment.
    ///
    /// A missing file is not an error; defaults and environment variables
    /// still apply.
    pub fn load(path: &str) -> Result<Self> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &str, env: Environment) -> Result<Self> {
        if Path::new(path).exists() {
            info!("Loading configuration from {}", path);
        } else {
            info!("Config file not found at {}, using defaults and environment", path);
        }

        let settings = config::Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {}", path))
    }

    /// Build auth settings, failing when a required key is missing
    pub fn auth_settings(&self) -> Result<AuthSettings> {
        let auth = &self.auth;

        let mut missing = Vec::new();
        if auth.jwt_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            missing.push("auth.jwt_key");
        }
        if auth.issuer.as_deref().is_none_or(|v| v.trim().is_empty()) {
            missing.push("auth.issuer");
        }
        if auth.audience.as_deref().is_none_or(|v| v.trim().is_empty()) {
            missing.push("auth.audience");
        }
        if auth.access_token_expiration_minutes.is_none() {
            missing.push("auth.access_token_expiration_minutes");
        }
        if auth.refresh_token_expiration_days.is_none() {
            missing.push("auth.refresh_token_expiration_days");
        }
        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }

        Ok(AuthSettings {
            jwt: JwtSettings {
                key: auth.jwt_key.clone().unwrap_or_default(),
                issuer: auth.issuer.clone().unwrap_or_default(),
                audience: auth.audience.clone().unwrap_or_default(),
                expiration_minutes: auth.access_token_expiration_minutes.unwrap_or_default(),
            },
            refresh_token_expiration_days: auth.refresh_token_expiration_days.unwrap_or_default(),
            rotation: auth.refresh_token_rotation,
            default_roles: auth.default_roles.clone(),
        })
    }
}
