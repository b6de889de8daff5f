//! Configuration management for handlescan.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Catalog used when no source is configured.
pub const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/sherlock-project/sherlock/master/sherlock_project/resources/data.json";

/// Main application configuration.
///
/// This is loaded from `~/.config/handlescan/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Probing behavior settings
    pub probing: ProbingConfig,
    /// Site catalog settings
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &std::path::Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HANDLESCAN_CONCURRENCY`: Override the in-flight probe limit
    /// - `HANDLESCAN_TIMEOUT_SECS`: Override the per-probe timeout
    /// - `HANDLESCAN_CATALOG`: Override the catalog source (path or URL)
    /// - `HANDLESCAN_PROXY`: Route probes through a proxy URL
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `HANDLESCAN_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HANDLESCAN_CONCURRENCY") {
            if let Ok(limit) = val.parse() {
                self.probing.concurrency_limit = limit;
                tracing::debug!("Override probing.concurrency_limit from env: {}", limit);
            }
        }

        if let Ok(val) = std::env::var("HANDLESCAN_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.probing.timeout_secs = secs;
                tracing::debug!("Override probing.timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("HANDLESCAN_CATALOG") {
            if !val.is_empty() {
                tracing::debug!("Override catalog.source from env: {}", val);
                self.catalog.source = Some(val);
            }
        }

        if let Ok(val) = std::env::var("HANDLESCAN_PROXY") {
            if !val.is_empty() {
                tracing::debug!("Override probing.proxy from env");
                self.probing.proxy = Some(val);
            }
        }
    }

    /// Check values that would make a probe session impossible to run.
    pub fn validate(&self) -> ConfigResult<()> {
        let probing = &self.probing;

        if probing.concurrency_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probing.concurrency_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if probing.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probing.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if probing.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "probing.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if probing.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "probing.backoff_multiplier".to_string(),
                reason: format!("must be >= 1.0, got {}", probing.backoff_multiplier),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/handlescan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "handlescan", "handlescan")
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// The catalog source to load, configured or default.
    #[must_use]
    pub fn catalog_source(&self) -> &str {
        self.catalog.source.as_deref().unwrap_or(DEFAULT_CATALOG_URL)
    }
}

/// Probing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbingConfig {
    /// Maximum number of probes in flight at once
    pub concurrency_limit: usize,
    /// Per-probe budget in seconds, covering every retry attempt
    pub timeout_secs: u64,
    /// Attempts per probe, including the first
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_backoff_ms: u64,
    /// Growth factor applied to the delay after each retry
    pub backoff_multiplier: f64,
    /// Upper bound on a single retry delay in milliseconds
    pub max_backoff_ms: u64,
    /// Overall session deadline in seconds; no new probes start after it
    pub session_deadline_secs: Option<u64>,
    /// User agent string
    pub user_agent: String,
    /// Optional proxy URL for every probe
    pub proxy: Option<String>,
    /// Skip sites flagged as adult content
    pub exclude_nsfw: bool,
}

impl ProbingConfig {
    /// Per-probe timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session deadline as a `Duration`, if configured.
    #[must_use]
    pub fn session_deadline(&self) -> Option<Duration> {
        self.session_deadline_secs.map(Duration::from_secs)
    }
}

impl Default for ProbingConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 20,
            timeout_secs: 60,
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 10_000,
            session_deadline_secs: None,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:129.0) Gecko/20100101 Firefox/129.0"
                .to_string(),
            proxy: None,
            exclude_nsfw: false,
        }
    }
}

/// Site catalog settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Local path or URL of the catalog; `None` uses [`DEFAULT_CATALOG_URL`]
    pub source: Option<String>,
    /// Fail the whole load on the first invalid entry instead of skipping it
    pub strict: bool,
}
