//! Configuration management for Viewer services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration (cache is optional)
    #[serde(default)]
    pub redis: Option<RedisConfig>,

    /// Solr search index
    pub search: SearchConfig,

    /// IIIF image and presentation urls
    #[serde(default)]
    pub iiif: IiifConfig,

    /// Watermark / image footer
    #[serde(default)]
    pub watermark: WatermarkConfig,

    /// EAD archives hosted in BaseX
    #[serde(default)]
    pub ead: EadConfig,

    /// PDF/EPUB download jobs
    #[serde(default)]
    pub download: DownloadConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

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

    /// Idle time after which anonymous session state is dropped
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

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
pub struct RedisConfig {
    /// Redis URL
    pub url: String,

    /// Default TTL in seconds
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Solr core url, e.g. http://localhost:8983/solr/collection1
    pub solr_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Rows returned when the caller gives no limit
    #[serde(default = "default_search_rows")]
    pub default_rows: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IiifConfig {
    /// Base of the IIIF image/presentation API, with trailing slash
    #[serde(default = "default_iiif_api_url")]
    pub iiif_api_url: String,

    /// Base of the REST API, with trailing slash
    #[serde(default = "default_rest_api_url")]
    pub rest_api_url: String,

    /// Public viewer url, with trailing slash
    #[serde(default = "default_viewer_url")]
    pub viewer_url: String,

    /// Route external (non-IIIF) image urls through the IIIF image API
    #[serde(default = "default_true")]
    pub use_iiif_api: bool,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,

    #[serde(default = "default_max_image_size")]
    pub max_image_width: u32,

    #[serde(default = "default_max_image_size")]
    pub max_image_height: u32,

    #[serde(default = "default_quality")]
    pub default_quality: String,

    #[serde(default = "default_format")]
    pub default_format: String,

    /// Tile size -> scale factors
    #[serde(default = "default_tile_sizes")]
    pub tile_sizes: Vec<TileSize>,

    /// Image sizes offered by the zoomable image view
    #[serde(default = "default_zoom_scales")]
    pub image_view_zoom_scales: Vec<String>,

    /// Placeholder image delivered for access-restricted pages
    #[serde(default = "default_access_denied_image")]
    pub access_denied_image: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TileSize {
    pub size: u32,
    pub scale_factors: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Ordered text sources: `SOLR:<FIELD>`, `URN`, `PURL` or a literal text
    #[serde(default)]
    pub text_configuration: Vec<String>,

    /// Index fields used to pick a footer id, first match wins
    #[serde(default)]
    pub id_by_field: Vec<String>,

    #[serde(default = "default_footer_height")]
    pub footer_height: u32,

    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EadConfig {
    /// BaseX REST url, with trailing slash
    #[serde(default = "default_basex_url")]
    pub basex_url: String,

    /// Default database
    #[serde(default)]
    pub database: Option<String>,

    /// Nodes above this depth start expanded
    #[serde(default = "default_collapse_level")]
    pub collapse_level: usize,

    #[serde(default = "default_ead_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// TaskManager REST url, with trailing slash
    #[serde(default = "default_task_manager_url")]
    pub task_manager_url: String,

    /// Folder the TaskManager writes generated files to
    #[serde(default = "default_download_folder")]
    pub folder: String,

    /// Time a finished file is kept after its last request
    #[serde(default = "default_download_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Request ID header name
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_session_idle() -> u64 { 3600 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_redis_ttl() -> u64 { 300 }
fn default_search_timeout() -> u64 { 10 }
fn default_search_rows() -> u32 { 100 }
fn default_iiif_api_url() -> String { "http://localhost:8080/viewer/api/v1/".to_string() }
fn default_rest_api_url() -> String { "http://localhost:8080/viewer/api/v1/".to_string() }
fn default_viewer_url() -> String { "http://localhost:8080/viewer/".to_string() }
fn default_true() -> bool { true }
fn default_thumbnail_width() -> u32 { 100 }
fn default_thumbnail_height() -> u32 { 120 }
fn default_max_image_size() -> u32 { 10000 }
fn default_quality() -> String { "default".to_string() }
fn default_format() -> String { "jpg".to_string() }
fn default_tile_sizes() -> Vec<TileSize> {
    vec![TileSize { size: 512, scale_factors: vec![1, 2, 4, 8, 16, 32] }]
}
fn default_zoom_scales() -> Vec<String> {
    vec!["600".to_string(), "1000".to_string(), "1500".to_string(), "3000".to_string()]
}
fn default_access_denied_image() -> String { "access_denied.png".to_string() }
fn default_footer_height() -> u32 { 50 }
fn default_basex_url() -> String { "http://localhost:8984/".to_string() }
fn default_collapse_level() -> usize { 1 }
fn default_ead_cache_ttl() -> u64 { 3600 }
fn default_task_manager_url() -> String { "http://localhost:8080/itm/".to_string() }
fn default_download_folder() -> String { "/opt/digiverso/viewer/download".to_string() }
fn default_download_ttl() -> u64 { 7 * 24 * 3600 }
fn default_poll_interval() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_jwt_expiration() -> u64 { 3600 }
fn default_request_id_header() -> String { "X-Request-ID".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "viewer".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }

impl Default for IiifConfig {
    fn default() -> Self {
        Self {
            iiif_api_url: default_iiif_api_url(),
            rest_api_url: default_rest_api_url(),
            viewer_url: default_viewer_url(),
            use_iiif_api: true,
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            max_image_width: default_max_image_size(),
            max_image_height: default_max_image_size(),
            default_quality: default_quality(),
            default_format: default_format(),
            tile_sizes: default_tile_sizes(),
            image_view_zoom_scales: default_zoom_scales(),
            access_denied_image: default_access_denied_image(),
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            text_configuration: Vec::new(),
            id_by_field: Vec::new(),
            footer_height: default_footer_height(),
            format: default_format(),
        }
    }
}

impl Default for EadConfig {
    fn default() -> Self {
        Self {
            basex_url: default_basex_url(),
            database: None,
            collapse_level: default_collapse_level(),
            cache_ttl_secs: default_ead_cache_ttl(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            task_manager_url: default_task_manager_url(),
            folder: default_download_folder(),
            ttl_secs: default_download_ttl(),
            poll_interval_secs: default_poll_interval(),
            max_retries: default_max_retries(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            request_id_header: default_request_id_header(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: true,
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
            enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. APP__SEARCH__SOLR_URL=http://solr:8983/solr/collection1
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
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
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                shutdown_timeout_secs: default_shutdown_timeout(),
                session_idle_secs: default_session_idle(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/viewer".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            redis: None,
            search: SearchConfig {
                solr_url: "http://localhost:8983/solr/collection1".to_string(),
                timeout_secs: default_search_timeout(),
                default_rows: default_search_rows(),
            },
            iiif: IiifConfig::default(),
            watermark: WatermarkConfig::default(),
            ead: EadConfig::default(),
            download: DownloadConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.iiif.default_format, "jpg");
        assert!(config.iiif.iiif_api_url.ends_with('/'));
        assert!(!config.watermark.enabled);
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/viewer");
    }

    #[test]
    fn test_download_ttl_is_one_week() {
        let config = AppConfig::default();
        assert_eq!(config.download.ttl_secs, 604_800);
    }
}
