//! Global key capture using rdev
//!
//! rdev hooks the platform input stream (XRecord on X11, a CGEvent tap on
//! macOS, a low-level hook on Windows) and calls back on its own thread.
//! macOS requires Accessibility permission to be granted to the
//! terminal/app.
//!
//! `rdev::listen` never returns on success and cannot be cancelled from
//! another thread, so stopping means detaching: the callback drops every
//! event once the handler has answered [`Flow::Stop`] or [`stop`] was
//! called, and the thread ends with the process.
//!
//! Letters follow the active keyboard layout: the character rdev reports
//! for a key press wins over the physical key code, so Ctrl+C means the key
//! that types `c` on Dvorak too.
//!
//! [`stop`]: KeyEventSource::stop

use super::{Flow, Key, KeyEvent, KeyEventHandler, KeyEventSource};
use crate::error::HotkeyError;
use rdev::{listen, Event, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for rdev to fail immediately (missing XRecord, denied tap)
const STARTUP_PROBE: Duration = Duration::from_millis(250);

/// rdev-based global key event source
pub struct RdevKeySource {
    attached: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl RdevKeySource {
    pub fn new() -> Self {
        Self {
            attached: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl Default for RdevKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyEventSource for RdevKeySource {
    fn start(&mut self, handler: Arc<dyn KeyEventHandler>) -> Result<(), HotkeyError> {
        if self.thread_handle.is_some() {
            return Err(HotkeyError::AlreadyStarted);
        }

        // Check/request Accessibility permission before starting the listener.
        // This triggers the macOS system dialog if permission hasn't been granted.
        #[cfg(target_os = "macos")]
        if !check_accessibility_permission() {
            tracing::warn!("{}", HotkeyError::PermissionDenied);
        }

        let attached = self.attached.clone();
        attached.store(true, Ordering::SeqCst);
        let (err_tx, err_rx) = mpsc::channel::<String>();

        let thread_handle = std::thread::Builder::new()
            .name("rdev-listener".into())
            .spawn(move || {
                let attached_clone = attached.clone();
                let mut translator = KeyTranslator::default();
                let callback = move |event: Event| {
                    if !attached_clone.load(Ordering::SeqCst) {
                        return;
                    }

                    let Some(key_event) =
                        translator.translate(&event.event_type, event.name.as_deref())
                    else {
                        return;
                    };

                    if handler.handle(key_event) == Flow::Stop {
                        attached_clone.store(false, Ordering::SeqCst);
                        tracing::debug!("Key handler requested stop, detaching from rdev");
                    }
                };

                // This blocks until an error occurs or the process is terminated
                if let Err(e) = listen(callback) {
                    let message = format!("{:?}", e);
                    tracing::error!("rdev listen error: {}", message);
                    attached.store(false, Ordering::SeqCst);
                    let _ = err_tx.send(message);
                }
            })?;

        match err_rx.recv_timeout(STARTUP_PROBE) {
            Ok(message) => {
                let _ = thread_handle.join();
                self.attached.store(false, Ordering::SeqCst);
                Err(HotkeyError::ListenFailed(message))
            }
            Err(_) => {
                tracing::info!("Global key listener started");
                self.thread_handle = Some(thread_handle);
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        if self.attached.swap(false, Ordering::SeqCst) {
            tracing::info!("Global key listener detached");
        }
        // The rdev thread cannot be joined; it ends with the process
        self.thread_handle.take();
    }

    fn name(&self) -> &'static str {
        "rdev"
    }
}

impl From<std::io::Error> for HotkeyError {
    fn from(e: std::io::Error) -> Self {
        HotkeyError::ListenFailed(format!("failed to spawn listener thread: {}", e))
    }
}

/// Translates rdev events, resolving letters through the layout.
///
/// rdev only names key presses, so the letter seen on press is kept until
/// the matching release.
#[derive(Default)]
struct KeyTranslator {
    held: Vec<(rdev::Key, char)>,
}

impl KeyTranslator {
    fn translate(&mut self, event_type: &EventType, name: Option<&str>) -> Option<KeyEvent> {
        match event_type {
            EventType::KeyPress(key) => {
                let physical = map_key(*key);
                let letter = name.and_then(|name| layout_letter(name, physical));
                self.held.retain(|(held, _)| held != key);
                match letter {
                    Some(c) => {
                        self.held.push((*key, c));
                        Some(KeyEvent::Down(Key::Character(c)))
                    }
                    None => Some(KeyEvent::Down(physical)),
                }
            }
            EventType::KeyRelease(key) => {
                let letter = self
                    .held
                    .iter()
                    .position(|(held, _)| held == key)
                    .map(|i| self.held.swap_remove(i).1);
                match letter {
                    Some(c) => Some(KeyEvent::Up(Key::Character(c))),
                    None => Some(KeyEvent::Up(map_key(*key))),
                }
            }
            _ => None,
        }
    }
}

/// Letter produced by a key press, from the name rdev reports.
///
/// With Ctrl held, X11 and Windows report the control character
/// (`\u{3}` for Ctrl+C); those only count on physical letter keys, since
/// Tab and Enter share the same codes.
fn layout_letter(name: &str, physical: Key) -> Option<char> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    if c.is_ascii_alphabetic() {
        return Some(c.to_ascii_lowercase());
    }
    let code = c as u32;
    if (0x01..=0x1a).contains(&code) && matches!(physical, Key::Character(_)) {
        return char::from_u32(u32::from(b'a') + code - 1);
    }
    None
}

/// Map an rdev key to the logical keys the tracker understands
fn map_key(key: rdev::Key) -> Key {
    use rdev::Key as K;

    match key {
        K::ControlLeft | K::ControlRight => Key::Control,
        K::MetaLeft | K::MetaRight => Key::Meta,
        K::Escape => Key::Escape,
        K::KeyA => Key::Character('a'),
        K::KeyB => Key::Character('b'),
        K::KeyC => Key::Character('c'),
        K::KeyD => Key::Character('d'),
        K::KeyE => Key::Character('e'),
        K::KeyF => Key::Character('f'),
        K::KeyG => Key::Character('g'),
        K::KeyH => Key::Character('h'),
        K::KeyI => Key::Character('i'),
        K::KeyJ => Key::Character('j'),
        K::KeyK => Key::Character('k'),
        K::KeyL => Key::Character('l'),
        K::KeyM => Key::Character('m'),
        K::KeyN => Key::Character('n'),
        K::KeyO => Key::Character('o'),
        K::KeyP => Key::Character('p'),
        K::KeyQ => Key::Character('q'),
        K::KeyR => Key::Character('r'),
        K::KeyS => Key::Character('s'),
        K::KeyT => Key::Character('t'),
        K::KeyU => Key::Character('u'),
        K::KeyV => Key::Character('v'),
        K::KeyW => Key::Character('w'),
        K::KeyX => Key::Character('x'),
        K::KeyY => Key::Character('y'),
        K::KeyZ => Key::Character('z'),
        _ => Key::Other,
    }
}

/// Check if Accessibility permission is granted, prompting the user if not.
///
/// Calls AXIsProcessTrustedWithOptions with kAXTrustedCheckOptionPrompt=true,
/// which makes macOS show the "App wants to control this computer" dialog
/// if permission hasn't been granted yet.
#[cfg(target_os = "macos")]
pub fn check_accessibility_permission() -> bool {
    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrustedWithOptions(options: core_foundation::base::CFTypeRef) -> bool;
    }

    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::CFDictionary;
    use core_foundation::string::CFString;

    let key = CFString::new("AXTrustedCheckOptionPrompt");
    let value = CFBoolean::true_value();
    let options = CFDictionary::from_CFType_pairs(&[(key.as_CFType(), value.as_CFType())]);

    unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef() as _) }
}
