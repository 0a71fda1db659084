//! Layered lookup of `linea` settings.
//!
//! A resolved [`LineaConfig`] is built from, in increasing priority:
//! 1. the per-user file `~/.linea/config.toml`
//! 2. the project file `.linea/config.toml` under the chosen root
//! 3. `LINEA_*` variables and command line flags
//!
//! A value in a later file only wins when it differs from the built-in
//! default, so partial files compose.

use crate::error::ConfigError;
use crate::{ApiConfig, ConfigOverrides, LineaConfig, LoggingConfig};
use linea_core::{LayoutOptions, ProjectionOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both under the home directory and locally.
const CONFIG_DIR: &str = ".linea";

/// Resolves `linea` settings, keeping the per-user file after the first read.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Per-user settings directory, `~/.linea` unless overridden
    global_config_dir: Option<PathBuf>,

    /// Parsed per-user file
    global_config: Option<LineaConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader rooted at `~/.linea`, or without per-user settings when no home
    /// directory can be found.
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Loader reading per-user settings from `global_dir`, as set by
    /// `LINEA_CONFIG_HOME`.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    /// Where the per-user settings file lives, if there is a home directory.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Project settings file for `root`.
    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Resolve the settings for `root`: defaults, then the per-user file,
    /// the project file and finally `overrides`. The result is validated.
    pub fn load(
        &mut self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<LineaConfig, ConfigError> {
        let mut config = LineaConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse the per-user file, or `None` when it does not exist.
    pub fn load_global(&mut self) -> Result<Option<LineaConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;

        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Parse the project file under `root`, or `None` when it does not exist.
    pub fn load_local(&self, root: &Path) -> Result<Option<LineaConfig>, ConfigError> {
        let local_path = self.local_config_path(root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Write `config` as the per-user settings file.
    pub fn save_global(&self, config: &LineaConfig) -> Result<(), ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        save_config_file(&global_dir.join(CONFIG_FILE_NAME), config)
    }

    /// Write `config` as the project settings file under `root`.
    pub fn save_local(&self, root: &Path, config: &LineaConfig) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(root), config)
    }

    /// Write default settings to `~/.linea/config.toml` unless the file exists.
    /// Returns its path either way.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };

        init_config_file(global_dir.join(CONFIG_FILE_NAME))
    }

    /// Write default settings to `<root>/.linea/config.toml` unless the file
    /// exists. Returns its path either way.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        init_config_file(self.local_config_path(root))
    }

    /// Drop the parsed per-user file so it is read from disk again.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn init_config_file(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        save_config_file(&path, &LineaConfig::default())?;
    }
    Ok(path)
}

/// Read and parse one settings file.
fn load_config_file(path: &Path) -> Result<LineaConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Serialize `config` to `path`, creating its directory.
fn save_config_file(path: &Path, config: &LineaConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// `overlay` when it was set away from the default, otherwise `base`.
fn prefer<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configurations, with `overlay` taking precedence.
fn merge_configs(base: LineaConfig, overlay: LineaConfig) -> LineaConfig {
    LineaConfig {
        api: merge_api(base.api, overlay.api),
        projection: merge_projection(base.projection, overlay.projection),
        layout: merge_layout(base.layout, overlay.layout),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_api(base: ApiConfig, overlay: ApiConfig) -> ApiConfig {
    let default = ApiConfig::default();
    ApiConfig {
        base_url: prefer(base.base_url, overlay.base_url, default.base_url),
        api_key: overlay.api_key.or(base.api_key),
        timeout_secs: prefer(base.timeout_secs, overlay.timeout_secs, default.timeout_secs),
        max_retries: prefer(base.max_retries, overlay.max_retries, default.max_retries),
        depth: prefer(base.depth, overlay.depth, default.depth),
        direction: prefer(base.direction, overlay.direction, default.direction),
        page_size: prefer(base.page_size, overlay.page_size, default.page_size),
    }
}

fn merge_projection(base: ProjectionOptions, overlay: ProjectionOptions) -> ProjectionOptions {
    let default = ProjectionOptions::default();
    ProjectionOptions {
        threshold: prefer(base.threshold, overlay.threshold, default.threshold),
        dissolve_single_member_buckets: prefer(
            base.dissolve_single_member_buckets,
            overlay.dissolve_single_member_buckets,
            default.dissolve_single_member_buckets,
        ),
    }
}

fn merge_layout(base: LayoutOptions, overlay: LayoutOptions) -> LayoutOptions {
    let default = LayoutOptions::default();
    LayoutOptions {
        flow: prefer(base.flow, overlay.flow, default.flow),
        table_size: prefer(base.table_size, overlay.table_size, default.table_size),
        bucket_size: prefer(base.bucket_size, overlay.bucket_size, default.bucket_size),
        container_padding: prefer(
            base.container_padding,
            overlay.container_padding,
            default.container_padding,
        ),
        container_header: prefer(
            base.container_header,
            overlay.container_header,
            default.container_header,
        ),
        rank_separation: prefer(
            base.rank_separation,
            overlay.rank_separation,
            default.rank_separation,
        ),
        node_separation: prefer(
            base.node_separation,
            overlay.node_separation,
            default.node_separation,
        ),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: prefer(base.level, overlay.level, LoggingConfig::default().level),
    }
}
