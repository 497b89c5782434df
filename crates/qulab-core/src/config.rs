//! Configuration module for the Qulab kernel.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, environment overrides, and a
//! builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for the Qulab kernel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Usage-telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether usage telemetry is collected at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Collector endpoint URL for the HTTP sink. `None` keeps events local.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// User-agent label of the embedding host (notebook frontend, CI, ...).
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Label of the hosting environment (local, cloud workspace, ...).
    #[serde(default)]
    pub hosting_environment: Option<String>,
    /// Background performance sampling settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Background performance-sampling settings.
///
/// Sampling is off by default so test runs observe a deterministic event
/// sequence; the embedding kernel turns it on for production sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Whether the periodic sampler task runs.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between performance samples.
    #[serde(default = "default_sampler_interval")]
    pub interval_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_sampler_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// Environment overrides (see [`TelemetryConfig::apply_env_overrides`])
    /// are applied after parsing, so they always win over file values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.telemetry.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|_| {
            let mut config = Config::default();
            config.telemetry.apply_env_overrides();
            config
        })
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/qulab/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("qulab")
            .join("config.yaml")
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            user_agent: None,
            hosting_environment: None,
            sampler: SamplerConfig::default(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Environment variable naming the embedding host's user agent.
pub const ENV_USER_AGENT: &str = "QULAB_USER_AGENT";

/// Environment variable naming the hosting environment.
pub const ENV_HOSTING_ENVIRONMENT: &str = "QULAB_HOSTING_ENV";

impl TelemetryConfig {
    /// Applies process-environment overrides to this configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Split out from [`Self::apply_env_overrides`] so tests can exercise
    /// the merge without mutating process state.
    pub fn apply_overrides_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(agent) = get(ENV_USER_AGENT) {
            self.user_agent = Some(agent);
        }
        if let Some(env) = get(ENV_HOSTING_ENVIRONMENT) {
            self.hosting_environment = Some(env);
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"telemetry.endpoint"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- telemetry ---
        if let Some(endpoint) = &self.telemetry.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ValidationError {
                    field: "telemetry.endpoint".into(),
                    message: format!("must be an http(s) URL, got '{endpoint}'"),
                });
            }
        }
        if self.telemetry.sampler.interval_secs == 0 {
            errors.push(ValidationError {
                field: "telemetry.sampler.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use qulab_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .telemetry_endpoint("https://collector.qulab.dev/events")
///     .user_agent("qulab-notebook/0.1")
///     .sampler_enabled(true)
///     .build();
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a builder seeded with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables telemetry collection entirely.
    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.enabled = enabled;
        self
    }

    /// Sets the collector endpoint for the HTTP sink.
    pub fn telemetry_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.telemetry.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the embedding host's user-agent label.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.telemetry.user_agent = Some(agent.into());
        self
    }

    /// Sets the hosting-environment label.
    pub fn hosting_environment(mut self, env: impl Into<String>) -> Self {
        self.config.telemetry.hosting_environment = Some(env.into());
        self
    }

    /// Enables or disables background performance sampling.
    pub fn sampler_enabled(mut self, enabled: bool) -> Self {
        self.config.telemetry.sampler.enabled = enabled;
        self
    }

    /// Sets the seconds between performance samples.
    pub fn sampler_interval_secs(mut self, secs: u64) -> Self {
        self.config.telemetry.sampler.interval_secs = secs;
        self
    }

    /// Sets the log level.
    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Finalizes the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}
