//! Configuration management for Noe Ops services
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
    /// Deployment environment: development or production
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Session authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Odoo ERP connection
    #[serde(default)]
    pub odoo: OdooConfig,

    /// Toast POS connection
    #[serde(default)]
    pub toast: ToastConfig,

    /// In-memory response caches
    #[serde(default)]
    pub cache: CacheConfig,

    /// Recipe costing defaults
    #[serde(default)]
    pub costing: CostingConfig,

    /// Document storage limits
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
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

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; the in-memory store is used when unset
    pub url: Option<String>,

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
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Session lifetime in seconds, counted from login
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    /// Interval of the expired session/cache sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Back-office username (mock login when unset in development)
    pub username: Option<String>,

    /// Hex SHA-256 of the back-office password
    pub password_sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OdooConfig {
    /// Base URL, e.g. https://erp.example.com
    pub url: Option<String>,

    /// Database name
    pub database: Option<String>,

    /// Login of the integration user
    pub username: Option<String>,

    /// API key (or password) of the integration user
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Products considered per ingredient during price sync
    #[serde(default = "default_product_search_limit")]
    pub search_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToastConfig {
    /// API host
    #[serde(default = "default_toast_api_base")]
    pub api_base: String,

    /// Machine client id
    pub client_id: Option<String>,

    /// Machine client secret
    pub client_secret: Option<String>,

    /// Restaurant external GUID
    pub restaurant_guid: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Default page size for order queries
    #[serde(default = "default_toast_page_size")]
    pub page_size: u32,

    /// Upper bound on pages walked by the sales summary
    #[serde(default = "default_max_summary_pages")]
    pub max_summary_pages: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// TTL for Odoo product search results
    #[serde(default = "default_cache_ttl")]
    pub odoo_products_ttl_secs: u64,

    /// TTL for Toast sales pages
    #[serde(default = "default_sales_ttl")]
    pub toast_sales_ttl_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CostingConfig {
    /// Q-factor applied when a recipe does not carry its own
    #[serde(default)]
    pub default_q_factor_percentage: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    /// Largest accepted decoded file payload
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// OpenTelemetry endpoint
    pub otel_endpoint: Option<String>,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_environment() -> String { "production".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3001 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_session_ttl() -> u64 { 24 * 60 * 60 }
fn default_sweep_interval() -> u64 { 300 }
fn default_upstream_timeout() -> u64 { 30 }
fn default_product_search_limit() -> u32 { 10 }
fn default_toast_api_base() -> String { "https://ws-api.toasttab.com".to_string() }
fn default_toast_page_size() -> u32 { 100 }
fn default_max_summary_pages() -> u32 { 20 }
fn default_cache_ttl() -> u64 { 300 }
fn default_sales_ttl() -> u64 { 120 }
fn default_max_file_bytes() -> usize { 10 * 1024 * 1024 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "noe-ops".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl Default for OdooConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: None,
            username: None,
            api_key: None,
            timeout_secs: default_upstream_timeout(),
            search_limit: default_product_search_limit(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            username: None,
            password_sha256: None,
        }
    }
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            api_base: default_toast_api_base(),
            client_id: None,
            client_secret: None,
            restaurant_guid: None,
            timeout_secs: default_upstream_timeout(),
            page_size: default_toast_page_size(),
            max_summary_pages: default_max_summary_pages(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            odoo_products_ttl_secs: default_cache_ttl(),
            toast_sales_ttl_secs: default_sales_ttl(),
        }
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self { max_file_bytes: default_max_file_bytes() }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            otel_endpoint: None,
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl OdooConfig {
    /// All four connection settings are present
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.database.is_some() && self.username.is_some() && self.api_key.is_some()
    }
}

impl ToastConfig {
    /// Client credentials and restaurant are present
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.restaurant_guid.is_some()
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_environment());

        let config = Config::builder()
            // Start with defaults
            .set_default("environment", env.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Development opts into mock login and raw error messages
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the session lifetime as Duration
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.session_ttl_secs)
    }

    /// Get the sweep interval as Duration, never shorter than one second
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.auth.sweep_interval_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            odoo: OdooConfig::default(),
            toast: ToastConfig::default(),
            cache: CacheConfig::default(),
            costing: CostingConfig::default(),
            documents: DocumentsConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
