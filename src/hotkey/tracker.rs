//! Hotkey state tracker
//!
//! Keeps the two modifier flags in [`RunState`] up to date and derives the
//! copy and exit triggers from key releases. Triggers are handed to a sink
//! closure which must not block: the daemon's sink only schedules work.

use super::{Flow, Key, KeyEvent, KeyEventHandler, PlatformModifier, Trigger};
use crate::state::RunState;
use std::sync::Arc;

type TriggerSink = Box<dyn Fn(Trigger) + Send + Sync>;

/// Derives [`Trigger`]s from raw key events
pub struct HotkeyTracker {
    modifier: PlatformModifier,
    state: Arc<RunState>,
    sink: TriggerSink,
}

impl HotkeyTracker {
    pub fn new<F>(modifier: PlatformModifier, state: Arc<RunState>, sink: F) -> Self
    where
        F: Fn(Trigger) + Send + Sync + 'static,
    {
        Self {
            modifier,
            state,
            sink: Box::new(sink),
        }
    }

    /// Key-down: track modifiers
    pub fn on_press(&self, key: Key) {
        if key == self.modifier.key() {
            self.state.set_modifier_pressed(true);
        }
        // Ctrl is tracked separately for Ctrl+Esc, even when it is also the copy modifier
        if key == Key::Control {
            self.state.set_ctrl_pressed(true);
        }
    }

    /// Key-up: emit triggers, clear modifiers, report whether to keep listening
    pub fn on_release(&self, key: Key) -> Flow {
        if key == Key::Character('c')
            && self.state.modifier_pressed()
            && !self.state.is_processing()
        {
            tracing::info!(
                "{} detected. Processing clipboard.",
                self.modifier.copy_shortcut()
            );
            (self.sink)(Trigger::Copy);
        }

        if key == Key::Escape && self.state.ctrl_pressed() {
            tracing::info!("Exit shortcut (Ctrl+Esc) detected. Requesting shutdown...");
            (self.sink)(Trigger::Exit);
        }

        if key == self.modifier.key() {
            self.state.set_modifier_pressed(false);
        }
        if key == Key::Control {
            self.state.set_ctrl_pressed(false);
        }

        self.flow()
    }

    fn flow(&self) -> Flow {
        if self.state.is_running() {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }
}

impl KeyEventHandler for HotkeyTracker {
    fn handle(&self, event: KeyEvent) -> Flow {
        match event {
            KeyEvent::Down(key) => {
                self.on_press(key);
                self.flow()
            }
            KeyEvent::Up(key) => self.on_release(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tracker(modifier: PlatformModifier) -> (HotkeyTracker, Arc<RunState>, Arc<Mutex<Vec<Trigger>>>) {
        let state = Arc::new(RunState::new());
        state.set_running(true);
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_clone = fired.clone();
        let tracker = HotkeyTracker::new(modifier, state.clone(), move |trigger| {
            fired_clone.lock().unwrap().push(trigger);
        });
        (tracker, state, fired)
    }

    fn feed(tracker: &HotkeyTracker, events: &[KeyEvent]) -> Flow {
        let mut flow = Flow::Continue;
        for event in events {
            flow = tracker.handle(*event);
        }
        flow
    }

    #[test]
    fn test_ctrl_c_triggers_copy() {
        let (tracker, _state, fired) = tracker(PlatformModifier::Control);
        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Control),
                KeyEvent::Down(Key::Character('c')),
                KeyEvent::Up(Key::Character('c')),
                KeyEvent::Up(Key::Control),
            ],
        );
        assert_eq!(*fired.lock().unwrap(), vec![Trigger::Copy]);
    }

    #[test]
    fn test_c_without_modifier_is_ignored() {
        let (tracker, _state, fired) = tracker(PlatformModifier::Control);
        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Character('c')),
                KeyEvent::Up(Key::Character('c')),
            ],
        );
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_modifier_released_before_c_is_ignored() {
        let (tracker, _state, fired) = tracker(PlatformModifier::Control);
        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Control),
                KeyEvent::Down(Key::Character('c')),
                KeyEvent::Up(Key::Control),
                KeyEvent::Up(Key::Character('c')),
            ],
        );
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cmd_c_on_meta_platform() {
        let (tracker, _state, fired) = tracker(PlatformModifier::Meta);
        // Ctrl+C is a plain keystroke when Cmd is the copy modifier
        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Control),
                KeyEvent::Up(Key::Character('c')),
                KeyEvent::Up(Key::Control),
            ],
        );
        assert!(fired.lock().unwrap().is_empty());

        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Meta),
                KeyEvent::Up(Key::Character('c')),
                KeyEvent::Up(Key::Meta),
            ],
        );
        assert_eq!(*fired.lock().unwrap(), vec![Trigger::Copy]);
    }

    #[test]
    fn test_copy_suppressed_while_processing() {
        let (tracker, state, fired) = tracker(PlatformModifier::Control);
        let guard = state.try_begin_processing().unwrap();
        feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Control),
                KeyEvent::Up(Key::Character('c')),
            ],
        );
        assert!(fired.lock().unwrap().is_empty());

        drop(guard);
        tracker.on_release(Key::Character('c'));
        assert_eq!(*fired.lock().unwrap(), vec![Trigger::Copy]);
    }

    #[test]
    fn test_ctrl_esc_triggers_exit_on_every_platform() {
        for modifier in [PlatformModifier::Control, PlatformModifier::Meta] {
            let (tracker, _state, fired) = tracker(modifier);
            feed(
                &tracker,
                &[
                    KeyEvent::Down(Key::Control),
                    KeyEvent::Down(Key::Escape),
                    KeyEvent::Up(Key::Escape),
                ],
            );
            assert_eq!(*fired.lock().unwrap(), vec![Trigger::Exit]);
        }
    }

    #[test]
    fn test_exit_fires_even_while_processing() {
        let (tracker, state, fired) = tracker(PlatformModifier::Control);
        let _guard = state.try_begin_processing().unwrap();
        feed(
            &tracker,
            &[KeyEvent::Down(Key::Control), KeyEvent::Up(Key::Escape)],
        );
        assert_eq!(*fired.lock().unwrap(), vec![Trigger::Exit]);
    }

    #[test]
    fn test_escape_without_ctrl_is_ignored() {
        let (tracker, _state, fired) = tracker(PlatformModifier::Meta);
        feed(
            &tracker,
            &[KeyEvent::Down(Key::Meta), KeyEvent::Up(Key::Escape)],
        );
        assert!(fired.lock().unwrap().is_empty());
    }

    #[test]
    fn test_other_keys_are_ignored() {
        let (tracker, state, fired) = tracker(PlatformModifier::Control);
        let flow = feed(
            &tracker,
            &[
                KeyEvent::Down(Key::Other),
                KeyEvent::Up(Key::Other),
                KeyEvent::Down(Key::Character('v')),
                KeyEvent::Up(Key::Character('v')),
            ],
        );
        assert_eq!(flow, Flow::Continue);
        assert!(fired.lock().unwrap().is_empty());
        assert!(!state.modifier_pressed());
        assert!(!state.ctrl_pressed());
    }

    #[test]
    fn test_modifier_flags_follow_press_and_release() {
        let (tracker, state, _fired) = tracker(PlatformModifier::Meta);
        tracker.on_press(Key::Meta);
        tracker.on_press(Key::Control);
        assert!(state.modifier_pressed());
        assert!(state.ctrl_pressed());

        tracker.on_release(Key::Meta);
        assert!(!state.modifier_pressed());
        assert!(state.ctrl_pressed());

        tracker.on_release(Key::Control);
        assert!(!state.ctrl_pressed());
    }

    #[test]
    fn test_stop_once_not_running() {
        let state = Arc::new(RunState::new());
        state.set_running(true);
        let state_for_sink = state.clone();
        let tracker = HotkeyTracker::new(PlatformModifier::Control, state.clone(), move |trigger| {
            if trigger == Trigger::Exit {
                state_for_sink.set_running(false);
            }
        });

        assert_eq!(tracker.handle(KeyEvent::Down(Key::Control)), Flow::Continue);
        assert_eq!(tracker.handle(KeyEvent::Up(Key::Escape)), Flow::Stop);
        assert_eq!(tracker.handle(KeyEvent::Down(Key::Other)), Flow::Stop);
    }
}
