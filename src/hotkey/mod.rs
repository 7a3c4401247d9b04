//! Hotkey detection module
//!
//! Global key events come from a [`KeyEventSource`] (rdev on every
//! platform). The source translates platform key objects into the typed
//! [`KeyEvent`] at its boundary and hands them to a [`KeyEventHandler`],
//! normally the [`tracker::HotkeyTracker`], which turns raw presses and
//! releases into [`Trigger`]s.
//!
//! Shortcuts:
//! - Cmd+C (macOS) / Ctrl+C (elsewhere): process the clipboard
//! - Ctrl+Esc (all platforms): exit

pub mod rdev_listener;
pub mod tracker;

use crate::error::HotkeyError;
use std::sync::Arc;

/// Logical key, decided by the event source adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Left or right Control
    Control,
    /// Left or right Command / Super / Windows key
    Meta,
    Escape,
    /// A letter key, lowercase
    Character(char),
    /// Anything else (media keys, function keys, unknown codes)
    Other,
}

/// A single key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(Key),
    Up(Key),
}

/// Logical actions derived from key sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The copy shortcut was released; process the clipboard
    Copy,
    /// The exit shortcut was released
    Exit,
}

/// Whether the event source should keep delivering events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// The modifier that forms the copy shortcut on this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformModifier {
    /// Ctrl+C (Linux, Windows)
    Control,
    /// Cmd+C (macOS)
    Meta,
}

impl PlatformModifier {
    /// Modifier for the platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            PlatformModifier::Meta
        } else {
            PlatformModifier::Control
        }
    }

    pub fn key(&self) -> Key {
        match self {
            PlatformModifier::Control => Key::Control,
            PlatformModifier::Meta => Key::Meta,
        }
    }

    /// Human-readable copy shortcut
    pub fn copy_shortcut(&self) -> &'static str {
        match self {
            PlatformModifier::Control => "Ctrl+C",
            PlatformModifier::Meta => "Cmd+C",
        }
    }
}

/// Receiver of typed key events
///
/// Called on the event source's own thread; implementations must return
/// quickly.
pub trait KeyEventHandler: Send + Sync {
    fn handle(&self, event: KeyEvent) -> Flow;
}

/// Trait for global key event sources
pub trait KeyEventSource: Send {
    /// Start delivering events to `handler`
    fn start(&mut self, handler: Arc<dyn KeyEventHandler>) -> Result<(), HotkeyError>;

    /// Stop delivering events
    fn stop(&mut self);

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Factory function to create the platform key event source
pub fn create_source() -> Box<dyn KeyEventSource> {
    Box::new(rdev_listener::RdevKeySource::new())
}
