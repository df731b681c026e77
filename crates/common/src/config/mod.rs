//! Configuration management for LabTrack services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Tenant routing configuration
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Log every SQL statement at debug level
    #[serde(default)]
    pub sql_logging: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Lifetime of a login session in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Secret prepended to passwords before hashing
    pub password_pepper: Option<String>,

    /// Minimum accepted password length at registration
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TenancyConfig {
    /// Suffix used for a center's auto-created primary domain
    /// (`{schema_name}.{domain_suffix}`)
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_session_ttl() -> u64 { 60 * 60 * 24 * 14 }
fn default_min_password_length() -> usize { 8 }
fn default_domain_suffix() -> String { "localhost".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "labtrack".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            password_pepper: None,
            min_password_length: default_min_password_length(),
        }
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            domain_suffix: default_domain_suffix(),
        }
    }
}

impl AuthConfig {
    /// Session lifetime; a value chrono cannot represent falls back to the
    /// default
    pub fn session_ttl(&self) -> chrono::Duration {
        i64::try_from(self.session_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::days(14))
    }
}

impl TenancyConfig {
    /// Primary domain hostname for a freshly provisioned schema
    pub fn domain_for(&self, schema_name: &str) -> String {
        format!("{}.{}", schema_name, self.domain_suffix).to_lowercase()
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__DATABASE__URL=postgres://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get session lifetime as a chrono Duration
    pub fn session_ttl(&self) -> chrono::Duration {
        self.auth.session_ttl()
    }

    /// Primary domain hostname for a freshly provisioned schema
    pub fn default_domain_for(&self, schema_name: &str) -> String {
        self.tenancy.domain_for(schema_name)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/labtrack".to_string(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                sql_logging: false,
            },
            auth: AuthConfig::default(),
            tenancy: TenancyConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.tenancy.domain_suffix, "localhost");
        assert!(config.auth.password_pepper.is_none());
    }

    #[test]
    fn test_default_domain_for_schema() {
        let config = AppConfig::default();
        assert_eq!(config.default_domain_for("labx"), "labx.localhost");
        // Hostnames are stored lower-cased
        assert_eq!(config.default_domain_for("labX"), "labx.localhost");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "database": { "url": "postgres://db/labtrack" },
            "tenancy": { "domain_suffix": "lab.example.com" }
        }))
        .unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.default_domain_for("acme"), "acme.lab.example.com");
        assert_eq!(config.session_ttl(), chrono::Duration::days(14));
    }

    #[test]
    fn test_session_ttl_out_of_range_falls_back() {
        let mut auth = AuthConfig::default();
        auth.session_ttl_secs = u64::MAX;
        assert_eq!(auth.session_ttl(), chrono::Duration::days(14));

        auth.session_ttl_secs = i64::MAX as u64;
        assert_eq!(auth.session_ttl(), chrono::Duration::days(14));

        auth.session_ttl_secs = 3600;
        assert_eq!(auth.session_ttl(), chrono::Duration::hours(1));
    }
}
