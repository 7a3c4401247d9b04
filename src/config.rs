//! Configuration loading and types for clipassist
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/clipassist/config.toml)
//! 3. Environment variables (CLIPASSIST_*)
//! 4. CLI arguments (highest priority)
//!
//! Once loaded the configuration is never mutated; the daemon shares it
//! behind an `Arc`.

use crate::error::AssistantError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# clipassist Configuration
#
# Location: ~/.config/clipassist/config.toml
# All settings can be overridden via CLI flags

# Ollama model used for every request (positional CLI argument overrides)
model = "deepseek-r1:8b"

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for default location ($XDG_RUNTIME_DIR/clipassist/state),
# a custom path, or "disabled" to turn off. The daemon writes the current
# status ("idle", "processing", "error") to this file whenever it changes.
# state_file = "auto"

# Append-only diagnostic log ("auto", a path, or "disabled")
# log_file = "auto"

[server]
# Base URL of the Ollama server
url = "http://localhost:11434"

# Upper bound for a generation request, in seconds
request_timeout_secs = 60

# Upper bound for the startup availability probe, in seconds
availability_timeout_secs = 5

[timing]
# Delay between the copy shortcut and the clipboard read, so the copy lands first
debounce_ms = 100

# How long the tray icon stays red after a failed request
error_cooldown_secs = 3

# Time given to in-flight key callbacks to observe shutdown
shutdown_grace_ms = 200

# Maximum time to wait for an in-flight request on exit
join_timeout_secs = 5

[clipboard]
# Clipboard backend: "auto", "system", "wayland", "xclip" or "pbcopy"
# - system: native clipboard via arboard
# - wayland: wl-copy / wl-paste (wl-clipboard package)
# - xclip: xclip -selection clipboard
# - pbcopy: pbcopy / pbpaste (macOS)
backend = "auto"
"#;

/// Default Ollama model
pub const DEFAULT_MODEL: &str = "deepseek-r1:8b";

/// Default Ollama base URL
pub const DEFAULT_SERVER_URL: &str = "http://localhost:11434";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Model identifier sent with every generate request
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Debounce, cooldown and shutdown timings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Clipboard backend selection
    #[serde(default)]
    pub clipboard: ClipboardConfig,

    /// Optional path to state file for external integrations (e.g., Waybar)
    /// When set, the daemon writes the current status ("idle", "processing", "error")
    /// to this file whenever it changes.
    #[serde(default)]
    pub state_file: Option<String>,

    /// Log file location ("auto", explicit path, or "disabled")
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,
}

/// Ollama server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Base URL, e.g. "http://localhost:11434"
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Generate request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Availability probe timeout in seconds
    #[serde(default = "default_availability_timeout")]
    pub availability_timeout_secs: u64,
}

/// Timing knobs for the processing pipeline and shutdown
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_secs: u64,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

/// Clipboard configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClipboardConfig {
    #[serde(default)]
    pub backend: ClipboardBackend,
}

/// Clipboard backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardBackend {
    /// Native clipboard, falling back to command-line tools
    #[default]
    Auto,
    /// Native clipboard via arboard
    System,
    /// wl-copy / wl-paste
    Wayland,
    /// xclip -selection clipboard
    Xclip,
    /// pbcopy / pbpaste
    Pbcopy,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_availability_timeout() -> u64 {
    5
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_error_cooldown() -> u64 {
    3
}

fn default_shutdown_grace_ms() -> u64 {
    200
}

fn default_join_timeout() -> u64 {
    5
}

fn default_log_file() -> Option<String> {
    Some("auto".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            request_timeout_secs: default_request_timeout(),
            availability_timeout_secs: default_availability_timeout(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            error_cooldown_secs: default_error_cooldown(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            join_timeout_secs: default_join_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            server: ServerConfig::default(),
            timing: TimingConfig::default(),
            clipboard: ClipboardConfig::default(),
            state_file: None,
            log_file: default_log_file(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.availability_timeout_secs)
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "clipassist")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, lock)
    pub fn runtime_dir() -> PathBuf {
        // Use XDG_RUNTIME_DIR if available, otherwise fall back to the temp dir
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("clipassist")
    }

    /// Get the data directory path (for logs)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "clipassist")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve the state file path from config
    /// Returns None if state_file is not configured or explicitly disabled
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.state_file.as_deref(), || {
            Self::runtime_dir().join("state")
        })
    }

    /// Resolve the log file path from config
    /// Returns None if logging to a file is disabled
    pub fn resolve_log_file(&self) -> Option<PathBuf> {
        resolve_optional_path(self.log_file.as_deref(), || {
            Self::data_dir().join("clipassist.log")
        })
    }

    /// Check values that serde cannot express
    pub fn validate(&self) -> Result<(), AssistantError> {
        let url = &self.server.url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AssistantError::Config(format!(
                "server.url must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.model.trim().is_empty() {
            return Err(AssistantError::Config("model must not be empty".into()));
        }

        if self.server.request_timeout_secs == 0 || self.server.availability_timeout_secs == 0 {
            return Err(AssistantError::Config(
                "server timeouts must be greater than zero".into(),
            ));
        }

        // Warn about non-HTTPS for non-localhost endpoints
        if url.starts_with("http://")
            && !url.contains("localhost")
            && !url.contains("127.0.0.1")
            && !url.contains("[::1]")
        {
            tracing::warn!(
                "Server URL uses HTTP without TLS. Clipboard text will be transmitted unencrypted!"
            );
        }

        Ok(())
    }
}

fn resolve_optional_path(value: Option<&str>, auto: impl FnOnce() -> PathBuf) -> Option<PathBuf> {
    value.and_then(|path| match path.to_lowercase().as_str() {
        "disabled" | "none" | "off" | "false" => None,
        "auto" => Some(auto()),
        _ => Some(PathBuf::from(path)),
    })
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, AssistantError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| AssistantError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| AssistantError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(model) = std::env::var("CLIPASSIST_MODEL") {
        config.model = model;
    }
    if let Ok(url) = std::env::var("CLIPASSIST_URL") {
        config.server.url = url;
    }

    Ok(config)
}
