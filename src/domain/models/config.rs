use serde::{Deserialize, Serialize};

/// Main configuration structure for ecommerce tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Defaults applied to every tracker the middleware creates
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Domain-object type identifiers whose construction counts as an impression
    #[serde(default)]
    pub models: Vec<String>,

    /// Registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Request-lifecycle adapter configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-tracker settings, fixed when the tracker is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// ISO 4217 currency code reported to the client
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Brand filled into item projections that lack one
    #[serde(default = "default_brand")]
    pub brand: String,

    /// Enables client-side debug logging
    #[serde(default)]
    pub debug: bool,

    /// Analytics account identifier
    #[serde(default)]
    pub ga_id: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_brand() -> String {
    "Moniker".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            brand: default_brand(),
            debug: false,
            ga_id: String::new(),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistryConfig {
    /// Seconds after which an untouched tracker is considered leaked and
    /// evicted. Eviction is disabled when unset.
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,
}

/// What the middleware does with a request that has no session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Fail the request with `MissingSessionCapability`
    #[default]
    Fail,
    /// Log a warning and let the request proceed untracked
    Skip,
}

/// Request-lifecycle adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MiddlewareConfig {
    /// Render-context key the tracker is injected under
    #[serde(default = "default_render_key")]
    pub render_key: String,

    /// Handling of requests without session support
    #[serde(default)]
    pub session_policy: SessionPolicy,
}

fn default_render_key() -> String {
    "ee_tracker".to_string()
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            render_key: default_render_key(),
            session_policy: SessionPolicy::default(),
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

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
