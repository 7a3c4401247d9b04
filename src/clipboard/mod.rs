//! Clipboard access
//!
//! The processor only needs "read the current text" and "replace it with
//! this text". Backends:
//! - [`system::SystemClipboard`]: native clipboard via arboard
//! - [`command::CommandClipboard`]: wl-copy/wl-paste, xclip, pbcopy/pbpaste
//! - [`MemoryClipboard`]: in-process buffer (tests, embedding)
//!
//! All operations are synchronous; they run on the blocking pool together
//! with the inference call.

pub mod command;
pub mod system;

use crate::config::{ClipboardBackend, ClipboardConfig};
use crate::error::ClipboardError;
use std::sync::Mutex;

/// Trait for clipboard implementations
pub trait Clipboard: Send + Sync {
    /// Current clipboard text. An empty or non-text clipboard reads as "".
    fn read_text(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard contents with `text`
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Factory function to create the configured clipboard backend
pub fn create_clipboard(config: &ClipboardConfig) -> Result<Box<dyn Clipboard>, ClipboardError> {
    match config.backend {
        ClipboardBackend::System => Ok(Box::new(system::SystemClipboard::new()?)),
        ClipboardBackend::Wayland => command::CommandClipboard::wayland().map(boxed),
        ClipboardBackend::Xclip => command::CommandClipboard::xclip().map(boxed),
        ClipboardBackend::Pbcopy => command::CommandClipboard::pbcopy().map(boxed),
        ClipboardBackend::Auto => auto_detect(),
    }
}

fn boxed(clipboard: command::CommandClipboard) -> Box<dyn Clipboard> {
    Box::new(clipboard)
}

/// Native clipboard first, then whichever command-line tool is installed
fn auto_detect() -> Result<Box<dyn Clipboard>, ClipboardError> {
    let native_err = match system::SystemClipboard::new() {
        Ok(clipboard) => return Ok(Box::new(clipboard)),
        Err(e) => e,
    };
    tracing::debug!("Native clipboard unavailable ({}), trying command backends", native_err);

    let candidates: [fn() -> Result<command::CommandClipboard, ClipboardError>; 3] = [
        command::CommandClipboard::wayland,
        command::CommandClipboard::xclip,
        command::CommandClipboard::pbcopy,
    ];
    for candidate in candidates {
        match candidate() {
            Ok(clipboard) => {
                tracing::info!("Using {} clipboard backend", clipboard.name());
                return Ok(Box::new(clipboard));
            }
            Err(e) => tracing::debug!("{}", e),
        }
    }

    Err(native_err)
}

/// In-memory clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `text` on the clipboard
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
        }
    }

    /// Simulate a user copy
    pub fn set(&self, text: impl Into<String>) {
        *self.lock() = text.into();
    }

    pub fn get(&self) -> String {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        self.text.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        Ok(self.get())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.set(text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Shorten text for debug logs (char-safe)
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
