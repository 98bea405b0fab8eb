use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::document::VisualFeedback;

/// Main configuration structure for the composer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Transformation service connection
    #[serde(default)]
    pub service: ServiceConfig,

    /// Retry policy for stream establishment
    #[serde(default)]
    pub retry: RetryConfig,

    /// Composer defaults
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transformation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServiceConfig {
    /// Streaming endpoint receiving rewrite requests
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token, if the service requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Time allowed for the service to start answering, in seconds
    #[serde(default = "default_establish_timeout_secs")]
    pub establish_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:3000/api/compose".to_string()
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_establish_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            establish_timeout_secs: default_establish_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts to establish a stream, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds; doubles afterwards
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Defaults applied to actions dispatched without explicit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComposerConfig {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Marker shown over text while it is being rewritten
    #[serde(default)]
    pub visual_feedback: VisualFeedback,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_temperature: default_temperature(),
            visual_feedback: VisualFeedback::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for the console
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files (console only if unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}
