//! Native clipboard via arboard
//!
//! Works on X11, Wayland (data-control protocol), macOS and Windows without
//! external tools. An arboard handle is not shareable between threads, so
//! it sits behind a mutex.

use super::Clipboard;
use crate::error::ClipboardError;
use std::sync::Mutex;

pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, arboard::Clipboard> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        match self.lock().get_text() {
            Ok(text) => Ok(text),
            // Empty clipboard or an image: nothing to send
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.lock()
            .set_text(text)
            .map_err(|e| ClipboardError::Write(e.to_string()))?;
        tracing::debug!("Text copied to clipboard ({} chars)", text.len());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
