//! Error types for clipassist
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the clipassist application
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Tray error: {0}")]
    Tray(#[from] TrayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global key event capture
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Global key capture failed: {0}\n  On X11 make sure the XRecord extension is available; Wayland sessions need XWayland focus.")]
    ListenFailed(String),

    #[error("Key listener is already running")]
    AlreadyStarted,

    #[error("Accessibility permission not granted.\n  Grant access in: System Settings > Privacy & Security > Accessibility")]
    PermissionDenied,
}

/// Errors related to clipboard access
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read clipboard: {0}")]
    Read(String),

    #[error("Failed to write clipboard: {0}")]
    Write(String),

    #[error("{0} not found in PATH. Install it via your package manager.")]
    CommandNotFound(&'static str),
}

/// Errors related to the Ollama inference server
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Ollama not reachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Server returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl InferenceError {
    /// Text placed on the clipboard when a generation fails
    pub fn user_message(&self) -> String {
        match self {
            InferenceError::Unreachable { .. } => {
                "Error: Failed to connect to Ollama service".to_string()
            }
            InferenceError::Timeout(limit) => format!(
                "Error: Request to Ollama timed out after {}s",
                limit.as_secs()
            ),
            InferenceError::Status { code, .. } => format!(
                "Error: Could not get response from Ollama (Status code: {})",
                code
            ),
            InferenceError::Malformed(_) => "Error: Malformed response from Ollama".to_string(),
        }
    }
}

/// Errors related to the tray icon
#[derive(Error, Debug)]
pub enum TrayError {
    #[error("Invalid icon image: {0}")]
    Icon(String),

    #[error("Failed to create tray icon: {0}")]
    Build(String),
}

/// Result type alias using AssistantError
pub type Result<T> = std::result::Result<T, AssistantError>;

impl From<tray_icon::BadIcon> for TrayError {
    fn from(e: tray_icon::BadIcon) -> Self {
        TrayError::Icon(e.to_string())
    }
}

impl From<tray_icon::Error> for TrayError {
    fn from(e: tray_icon::Error) -> Self {
        TrayError::Build(e.to_string())
    }
}
