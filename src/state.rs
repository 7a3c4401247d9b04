//! Shared state for the clipassist daemon
//!
//! Two kinds of state cross thread boundaries:
//!
//! - [`RunState`]: flags owned by the daemon and touched by the key event
//!   thread, the deferred processing task and the tray loop.
//! - [`AppStatus`]: the Idle → Processing → Idle/Error status shown by the
//!   tray icon, distributed through a [`StatusPublisher`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// Application status displayed by the tray icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppStatus {
    /// Waiting for the copy shortcut
    #[default]
    Idle,
    /// A request is in flight
    Processing,
    /// The server is unreachable or the last request failed
    Error,
}

impl AppStatus {
    /// Name written to the state file
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Idle => "idle",
            AppStatus::Processing => "processing",
            AppStatus::Error => "error",
        }
    }

    /// Parse a state file value
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Some(AppStatus::Idle),
            "processing" => Some(AppStatus::Processing),
            "error" => Some(AppStatus::Error),
            _ => None,
        }
    }

    /// Status line shown in the tray menu
    pub fn status_text(&self) -> &'static str {
        match self {
            AppStatus::Idle => "Status: Ready",
            AppStatus::Processing => "Status: Processing...",
            AppStatus::Error => "Status: Error",
        }
    }
}

impl std::fmt::Display for AppStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mutable flags shared between the key event thread and the processing path
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    processing: AtomicBool,
    modifier_pressed: AtomicBool,
    ctrl_pressed: AtomicBool,
    previous_clipboard: Mutex<String>,
}

impl RunState {
    /// Create a stopped, idle run state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Claim the single-flight slot.
    ///
    /// Returns `None` if a cycle is already in flight. The slot is released
    /// when the returned guard is dropped, on every exit path.
    pub fn try_begin_processing(&self) -> Option<ProcessingGuard<'_>> {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard { state: self })
    }

    pub fn modifier_pressed(&self) -> bool {
        self.modifier_pressed.load(Ordering::SeqCst)
    }

    pub fn set_modifier_pressed(&self, pressed: bool) {
        self.modifier_pressed.store(pressed, Ordering::SeqCst);
    }

    pub fn ctrl_pressed(&self) -> bool {
        self.ctrl_pressed.load(Ordering::SeqCst)
    }

    pub fn set_ctrl_pressed(&self, pressed: bool) {
        self.ctrl_pressed.store(pressed, Ordering::SeqCst);
    }

    /// Clear both modifier flags (listener restart)
    pub fn reset_modifiers(&self) {
        self.set_modifier_pressed(false);
        self.set_ctrl_pressed(false);
    }

    /// Last clipboard text that was sent to the model
    pub fn previous_clipboard(&self) -> String {
        lock(&self.previous_clipboard).clone()
    }

    /// Record `text` as the last processed clipboard text.
    ///
    /// Returns false (and leaves the stored value alone) when `text` equals
    /// the stored value.
    pub fn remember_clipboard(&self, text: &str) -> bool {
        let mut previous = lock(&self.previous_clipboard);
        if *previous == text {
            return false;
        }
        *previous = text.to_string();
        true
    }
}

/// Scoped ownership of the single-flight slot
#[derive(Debug)]
pub struct ProcessingGuard<'a> {
    state: &'a RunState,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.state.processing.store(false, Ordering::SeqCst);
    }
}

/// Process-wide status holder
///
/// Writers call [`publish`](Self::publish); the tray loop either polls
/// [`current`](Self::current) or holds a [`watch::Receiver`]. The last write
/// wins. When a state file is configured every change is mirrored to it
/// while the channel lock is held, so the file never lags behind a newer
/// value.
#[derive(Debug)]
pub struct StatusPublisher {
    tx: watch::Sender<AppStatus>,
    state_file: Option<PathBuf>,
}

impl StatusPublisher {
    pub fn new(state_file: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(AppStatus::Idle);
        let publisher = Self { tx, state_file };
        publisher.write_state_file(AppStatus::Idle);
        publisher
    }

    /// Current status
    pub fn current(&self) -> AppStatus {
        *self.tx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<AppStatus> {
        self.tx.subscribe()
    }

    /// Set the status
    pub fn publish(&self, status: AppStatus) {
        self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::info!("Status: {} -> {}", current, status);
            *current = status;
            self.write_state_file(status);
            true
        });
    }

    /// Return to Idle, but only if the status is still Error.
    ///
    /// Used by the error cooldown so it never clobbers a newer cycle.
    pub fn reset_error(&self) -> bool {
        self.tx.send_if_modified(|current| {
            if *current != AppStatus::Error {
                return false;
            }
            tracing::info!("Status: error -> idle (cooldown elapsed)");
            *current = AppStatus::Idle;
            self.write_state_file(AppStatus::Idle);
            true
        })
    }

    /// Remove state file on shutdown
    pub fn cleanup(&self) {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!("Failed to remove state file: {}", e);
                }
            }
        }
    }

    /// Write state to file for external integrations (e.g., Waybar)
    fn write_state_file(&self, status: AppStatus) {
        let Some(ref path) = self.state_file else {
            return;
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create state file directory: {}", e);
                return;
            }
        }

        if let Err(e) = std::fs::write(path, status.as_str()) {
            tracing::warn!("Failed to write state file: {}", e);
        } else {
            tracing::trace!("State file updated: {}", status);
        }
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new(None)
    }
}
