//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.listen/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::guard::DEFAULT_PAGE;
use crate::feed::Endpoints;
use crate::feed::http::{DEFAULT_POLL_PATH, DEFAULT_SUBSCRIBE_PATH};
use crate::poller::{DEFAULT_DRAIN_TIMEOUT, FailurePolicy, PollerConfig, SubscribeMode};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub poller: PollerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub poll_path: Option<String>,
    pub subscribe_path: Option<String>,
    pub request_timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PollerSection {
    pub page: Option<String>,
    pub delay_secs: Option<f64>,
    pub subscribe_mode: Option<SubscribeMode>,
    pub on_error: Option<FailurePolicy>,
    pub trust_markup: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_LOG_LEVEL: &str = "debug";
pub const DEFAULT_LOG_FILE: &str = "listen.log";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub request_timeout: Option<Duration>,
    pub page: String,
    pub poller: PollerConfig,
    pub log_level: String,
    pub log_file: String,
}

/// Values taken from CLI flags. `None` = flag not given.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub page: Option<String>,
    pub delay_secs: Option<f64>,
    pub subscribe_mode: Option<SubscribeMode>,
    pub stop_on_error: bool,
    pub escape: bool,
    pub log_level: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.listen/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".listen").join("config.toml"))
}

/// Load config from `~/.listen/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ListenConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ListenConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ListenConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ListenConfig::default());
    }

    load_config_from(&path)
}

/// Load config from an explicit path. The file must exist.
pub fn load_config_from(path: &Path) -> Result<ListenConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ListenConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Listen Configuration
# All settings are optional — defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [server]
# base_url = "http://localhost:8000"   # Or set LISTEN_BASE_URL env var
# poll_path = "/poll/poll"
# subscribe_path = "/poll/subscribe"
# request_timeout_secs = 30.0          # Unset = no timeout (long polls can hang)

# [poller]
# page = "/event"                      # Polling stops once we navigate away from this page
# delay_secs = 1.0                     # Pause between cycles; unset = back to back
# subscribe_mode = "await"             # "await" or "detached"
# on_error = "continue"                # "continue" or "stop"
# trust_markup = true                  # false = escape event HTML

# [logging]
# level = "debug"                      # "error", "warn", "info", "debug", "trace"
# file = "listen.log"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &ListenConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading env vars through `env`.
pub fn resolve_with_env(
    config: &ListenConfig,
    cli: &CliOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Base URL: CLI → env → config → default
    let base_url = cli
        .base_url
        .clone()
        .or_else(|| env("LISTEN_BASE_URL"))
        .or_else(|| config.server.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    // Page: CLI → env → config → default
    let page = cli
        .page
        .clone()
        .or_else(|| env("LISTEN_PAGE"))
        .or_else(|| config.poller.page.clone())
        .unwrap_or_else(|| DEFAULT_PAGE.to_string());

    // Delay: CLI → env → config → none
    let delay_secs = cli.delay_secs.or_else(|| {
        env("LISTEN_DELAY_SECS").and_then(|v| match v.parse::<f64>() {
            Ok(secs) => Some(secs),
            Err(e) => {
                warn!("Ignoring invalid LISTEN_DELAY_SECS {:?}: {}", v, e);
                None
            }
        })
    });
    let delay = seconds(delay_secs.or(config.poller.delay_secs), "delay");

    let endpoints = Endpoints {
        poll: config
            .server
            .poll_path
            .clone()
            .unwrap_or_else(|| DEFAULT_POLL_PATH.to_string()),
        subscribe: config
            .server
            .subscribe_path
            .clone()
            .unwrap_or_else(|| DEFAULT_SUBSCRIBE_PATH.to_string()),
    };

    let failure_policy = if cli.stop_on_error {
        FailurePolicy::Stop
    } else {
        config.poller.on_error.unwrap_or_default()
    };

    let trust_markup = !cli.escape && config.poller.trust_markup.unwrap_or(true);

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    ResolvedConfig {
        base_url,
        endpoints,
        request_timeout: seconds(config.server.request_timeout_secs, "request_timeout_secs"),
        page,
        poller: PollerConfig {
            delay,
            subscribe_mode: cli
                .subscribe_mode
                .or(config.poller.subscribe_mode)
                .unwrap_or_default(),
            failure_policy,
            trust_markup,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        },
        log_level,
        log_file: config
            .logging
            .file
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
    }
}

/// Converts a seconds setting to a duration. Zero means "none"; negative or
/// non-finite values are ignored with a warning.
fn seconds(value: Option<f64>, name: &str) -> Option<Duration> {
    let secs = value?;
    if secs == 0.0 {
        return None;
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(d) => Some(d),
        Err(e) => {
            warn!("Ignoring invalid {} {}: {}", name, secs, e);
            None
        }
    }
}
