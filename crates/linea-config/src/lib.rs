//! Linea Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.linea/config.toml`
//! - Local config: `.linea/config.toml` (in the working directory)
//! - Environment and CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → overrides.
//!
//! # Example TOML
//!
//! ```toml
//! [api]
//! base_url = "https://lineage.example.com/api/v1"
//! depth = 3
//! direction = "upstream"
//!
//! [projection]
//! threshold = 15
//! dissolve_single_member_buckets = false
//!
//! [layout]
//! flow = "LR"
//! rank_separation = 80.0
//!
//! [logging]
//! level = "info"
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use linea_core::{FlowDirection, LayoutOptions, LineageDirection, ProjectionOptions, RenderOptions};
use serde::{Deserialize, Serialize};

/// Default lineage service endpoint.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Default traversal depth for graph requests.
pub const DEFAULT_DEPTH: u32 = 3;

/// Root configuration for Linea.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LineaConfig {
    /// Lineage service connection and request defaults
    pub api: ApiConfig,

    /// Domain aggregation tuning
    pub projection: ProjectionOptions,

    /// Layout geometry
    pub layout: LayoutOptions,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Lineage service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, including any path prefix such as `/api/v1`
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after a connection failure or 5xx response
    pub max_retries: u32,

    /// Traversal depth used when none is given
    pub depth: u32,

    /// Traversal direction used when none is given
    pub direction: LineageDirection,

    /// Page size for table listings
    pub page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 3,
            depth: DEFAULT_DEPTH,
            direction: LineageDirection::Upstream,
            page_size: 100,
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "api.base_url",
                format!("'{}' is not an http(s) URL", self.base_url),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "api.timeout_secs",
                "must be at least 1",
            ));
        }
        if self.depth == 0 {
            return Err(ConfigError::invalid_value("api.depth", "must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::invalid_value(
                "api.page_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// CLI and environment overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override lineage service URL
    pub api_url: Option<String>,

    /// Override bearer token
    pub api_key: Option<String>,

    /// Override aggregation threshold
    pub threshold: Option<usize>,

    /// Override layout flow direction
    pub flow: Option<FlowDirection>,

    /// Override log level
    pub log_level: Option<String>,
}

impl LineaConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref url) = overrides.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(ref key) = overrides.api_key {
            self.api.api_key = Some(key.clone());
        }

        if let Some(threshold) = overrides.threshold {
            self.projection.threshold = threshold;
        }

        if let Some(flow) = overrides.flow {
            self.layout.flow = flow;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;

        let layout = &self.layout;
        for (key, size) in [
            ("layout.table_size", layout.table_size),
            ("layout.bucket_size", layout.bucket_size),
        ] {
            if size.width <= 0.0 || size.height <= 0.0 {
                return Err(ConfigError::invalid_value(key, "width and height must be positive"));
            }
        }
        for (key, value) in [
            ("layout.container_padding", layout.container_padding),
            ("layout.container_header", layout.container_header),
            ("layout.rank_separation", layout.rank_separation),
            ("layout.node_separation", layout.node_separation),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::invalid_value(key, "must be a non-negative number"));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}', expected one of: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        Ok(())
    }

    /// Options for the render pipeline.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            projection: self.projection,
            layout: self.layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linea_core::DEFAULT_AGGREGATION_THRESHOLD;

    #[test]
    fn test_default_config() {
        let config = LineaConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.api.depth, 3);
        assert_eq!(config.api.direction, LineageDirection::Upstream);
        assert_eq!(config.projection.threshold, DEFAULT_AGGREGATION_THRESHOLD);
        assert_eq!(config.layout.flow, FlowDirection::LeftToRight);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = LineaConfig::default();
        let overrides = ConfigOverrides {
            api_url: Some("https://lineage.internal/api/v1".to_string()),
            threshold: Some(40),
            flow: Some(FlowDirection::RightToLeft),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.api.base_url, "https://lineage.internal/api/v1");
        assert_eq!(config.api.api_key, None);
        assert_eq!(config.projection.threshold, 40);
        assert_eq!(config.layout.flow, FlowDirection::RightToLeft);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_render_options_follow_config() {
        let mut config = LineaConfig::default();
        config.projection.threshold = 5;
        config.layout.rank_separation = 120.0;

        let options = config.render_options();
        assert_eq!(options.projection.threshold, 5);
        assert_eq!(options.layout.rank_separation, 120.0);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = LineaConfig::default();
        config.api.base_url = "localhost:8000".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn test_validate_rejects_zero_depth() {
        let mut config = LineaConfig::default();
        config.api.depth = 0;
        assert!(config.validate().unwrap_err().to_string().contains("api.depth"));
    }

    #[test]
    fn test_validate_rejects_negative_spacing() {
        let mut config = LineaConfig::default();
        config.layout.node_separation = -1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("layout.node_separation"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = LineaConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: LineaConfig = toml::from_str(
            r#"
            [projection]
            threshold = 30

            [layout]
            flow = "RL"
            "#,
        )
        .unwrap();

        assert_eq!(config.projection.threshold, 30);
        assert!(!config.projection.dissolve_single_member_buckets);
        assert_eq!(config.layout.flow, FlowDirection::RightToLeft);
        assert_eq!(config.layout.table_size, LayoutOptions::default().table_size);
        assert_eq!(config.api, ApiConfig::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = LineaConfig::default();
        config.api.api_key = Some("secret".to_string());
        config.api.direction = LineageDirection::Both;
        config.projection.dissolve_single_member_buckets = true;

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: LineaConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
