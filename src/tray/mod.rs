//! System tray integration
//!
//! Runs the event loop on the main thread, showing an icon keyed by the
//! current [`AppStatus`] and a small menu:
//!
//! ```text
//! Status: Ready        (disabled)
//! ─────────────
//! Exit
//! ```
//!
//! The loop wakes every 100ms to pick up status changes, advance the
//! processing animation and notice shutdown requests from other threads.
//! Icon failures are logged and never end the loop.

pub mod icon;

use crate::daemon::Daemon;
use crate::error::{Result, TrayError};
use crate::state::AppStatus;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tao::platform::run_return::EventLoopExtRunReturn;
use tray_icon::{
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    TrayIcon, TrayIconBuilder,
};

/// Menu item IDs
mod menu_ids {
    pub const STATUS: &str = "status";
    pub const EXIT: &str = "exit";
}

const TICK: Duration = Duration::from_millis(100);

/// Whether a graphical session is available for a tray icon
pub fn display_available() -> bool {
    if cfg!(target_os = "linux") {
        std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
    } else {
        true
    }
}

fn clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Tray icon plus the menu line that mirrors the status
struct TrayHandle {
    tray: TrayIcon,
    status_item: MenuItem,
}

fn build_tray(status: AppStatus) -> Result<TrayHandle> {
    let menu = Menu::new();
    let status_item = MenuItem::with_id(menu_ids::STATUS, status.status_text(), false, None);
    let exit_item = MenuItem::with_id(menu_ids::EXIT, "Exit", true, None);

    let menu_error = |e: tray_icon::menu::Error| TrayError::Build(e.to_string());
    menu.append(&status_item).map_err(menu_error)?;
    menu.append(&PredefinedMenuItem::separator())
        .map_err(menu_error)?;
    menu.append(&exit_item).map_err(menu_error)?;

    let tray = TrayIconBuilder::new()
        .with_tooltip("clipassist")
        .with_icon(icon::render(status, clock_secs()).to_icon()?)
        .with_menu(Box::new(menu))
        .build()
        .map_err(TrayError::from)?;

    Ok(TrayHandle { tray, status_item })
}

/// Tracks what the icon currently shows, to redraw only on change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    status: AppStatus,
    dot: usize,
}

impl Frame {
    fn at(status: AppStatus, clock_secs: f64) -> Self {
        let dot = if status == AppStatus::Processing {
            icon::highlighted_dot(clock_secs)
        } else {
            0
        };
        Self { status, dot }
    }
}

impl TrayHandle {
    fn show(&self, frame: Frame, clock_secs: f64) {
        match icon::render(frame.status, clock_secs).to_icon() {
            Ok(image) => {
                if let Err(e) = self.tray.set_icon(Some(image)) {
                    tracing::warn!("Failed to update tray icon: {}", e);
                }
            }
            Err(e) => tracing::warn!("{}", e),
        }
        self.status_item.set_text(frame.status.status_text());
    }
}

/// Run the tray event loop until shutdown is requested.
///
/// Blocks the calling thread, which must be the main thread. If the tray
/// icon cannot be created the loop still runs without it.
pub fn run(daemon: &Arc<Daemon>) {
    let mut event_loop = EventLoopBuilder::new().build();

    // Menu bar only, no Dock icon
    #[cfg(target_os = "macos")]
    {
        use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
        event_loop.set_activation_policy(ActivationPolicy::Accessory);
    }

    let menu_channel = MenuEvent::receiver();
    let publisher = daemon.publisher().clone();
    let daemon = daemon.clone();
    let mut handle: Option<TrayHandle> = None;
    let mut frame = Frame::at(publisher.current(), 0.0);
    let mut stopping_since: Option<Instant> = None;

    event_loop.run_return(move |event, _, control_flow| {
        *control_flow = ControlFlow::WaitUntil(Instant::now() + TICK);

        // macOS requires the tray to be created once the loop is running
        if let Event::NewEvents(StartCause::Init) = event {
            match build_tray(frame.status) {
                Ok(tray) => {
                    tracing::info!("Tray icon ready");
                    handle = Some(tray);
                }
                Err(e) => tracing::warn!("{} (continuing without tray icon)", e),
            }
        }

        // Check for menu events (non-blocking)
        while let Ok(event) = menu_channel.try_recv() {
            if event.id().0.as_str() == menu_ids::EXIT {
                tracing::info!("Exit selected from tray menu");
                daemon.request_shutdown();
            }
        }

        if daemon.shutdown_requested() {
            // Give the key thread a moment to observe the stop
            let since = *stopping_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= daemon.shutdown_grace() {
                // Drop the icon before leaving so it disappears immediately
                handle.take();
                *control_flow = ControlFlow::Exit;
            }
            return;
        }

        let now = clock_secs();
        let next = Frame::at(publisher.current(), now);
        if next != frame {
            if let Some(ref tray) = handle {
                tray.show(next, now);
            }
            frame = next;
        }
    });
}

/// Wait for shutdown without a tray (no graphical session)
pub fn run_headless(daemon: &Daemon) {
    tracing::info!("No graphical session, running without tray icon. Press Ctrl+C to exit.");
    daemon.wait_for_shutdown();
    std::thread::sleep(daemon.shutdown_grace());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_only_animates_while_processing() {
        assert_eq!(Frame::at(AppStatus::Idle, 0.0), Frame::at(AppStatus::Idle, 0.5));
        assert_eq!(Frame::at(AppStatus::Error, 0.0), Frame::at(AppStatus::Error, 1.0));
        assert_ne!(
            Frame::at(AppStatus::Processing, 0.0),
            Frame::at(AppStatus::Processing, 0.5)
        );
        assert_ne!(Frame::at(AppStatus::Idle, 0.0), Frame::at(AppStatus::Error, 0.0));
    }
}
