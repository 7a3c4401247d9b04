//! Lifecycle controller
//!
//! Owns the pieces that make up a running assistant and moves them through
//! NotStarted → Running → Stopping → Stopped:
//!
//! - start: probe the server, then attach the key tracker. A failed probe
//!   or a failed key hook leaves the status at Error and the listener
//!   detached, but the tray still runs so the user can exit.
//! - request_shutdown: non-blocking, callable from the key thread, the tray
//!   loop or a signal handler. Stops future cycles and pending debounce
//!   tasks.
//! - finish: bounded wait for an in-flight cycle, then cleanup. A hung
//!   request is abandoned, never waited for indefinitely.

use crate::clipboard::Clipboard;
use crate::config::Config;
use crate::error::{AssistantError, HotkeyError};
use crate::hotkey::tracker::HotkeyTracker;
use crate::hotkey::{KeyEventSource, PlatformModifier, Trigger};
use crate::inference::Inference;
use crate::processor::Processor;
use crate::scheduler::Scheduler;
use crate::state::{AppStatus, RunState, StatusPublisher};
use pidlock::Pidlock;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Lifecycle phase of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Main daemon that wires hotkeys, processor, status and shutdown together
pub struct Daemon {
    config: Arc<Config>,
    state: Arc<RunState>,
    publisher: Arc<StatusPublisher>,
    scheduler: Arc<Scheduler>,
    inference: Arc<dyn Inference>,
    processor: Arc<Processor>,
    source: Mutex<Box<dyn KeyEventSource>>,
    phase: Mutex<Phase>,
    shutdown_tx: watch::Sender<bool>,
}

impl Daemon {
    /// Assemble a daemon; nothing runs until [`start`](Self::start)
    pub fn new(
        config: Arc<Config>,
        clipboard: Arc<dyn Clipboard>,
        inference: Arc<dyn Inference>,
        source: Box<dyn KeyEventSource>,
        runtime: Handle,
    ) -> Arc<Self> {
        let state = Arc::new(RunState::new());
        let publisher = Arc::new(StatusPublisher::new(config.resolve_state_file()));
        let scheduler = Arc::new(Scheduler::new(runtime));
        let processor = Arc::new(Processor::new(
            state.clone(),
            clipboard,
            inference.clone(),
            publisher.clone(),
            scheduler.clone(),
            config.timing.error_cooldown(),
        ));
        let (shutdown_tx, _rx) = watch::channel(false);

        Arc::new(Self {
            config,
            state,
            publisher,
            scheduler,
            inference,
            processor,
            source: Mutex::new(source),
            phase: Mutex::new(Phase::NotStarted),
            shutdown_tx,
        })
    }

    pub fn phase(&self) -> Phase {
        *lock(&self.phase)
    }

    pub fn state(&self) -> &Arc<RunState> {
        &self.state
    }

    pub fn publisher(&self) -> &Arc<StatusPublisher> {
        &self.publisher
    }

    pub fn processor(&self) -> &Arc<Processor> {
        &self.processor
    }

    /// Probe the server and attach the key tracker.
    ///
    /// On error the status is Error and the daemon stays in
    /// [`Phase::NotStarted`]; it can still be shut down normally.
    pub fn start(self: &Arc<Self>) -> Result<(), AssistantError> {
        if self.phase() != Phase::NotStarted {
            return Err(HotkeyError::AlreadyStarted.into());
        }

        tracing::info!(
            "Checking Ollama at {} (model: {})",
            self.config.server.url,
            self.inference.model()
        );
        if let Err(e) = self.inference.check_availability() {
            tracing::error!("Ollama service is not available: {}", e);
            tracing::error!("Make sure Ollama is running ('ollama serve') and try again");
            self.publisher.publish(AppStatus::Error);
            return Err(e.into());
        }
        self.publisher.publish(AppStatus::Idle);

        let modifier = PlatformModifier::current();
        let daemon: Weak<Daemon> = Arc::downgrade(self);
        let tracker = HotkeyTracker::new(modifier, self.state.clone(), move |trigger| {
            if let Some(daemon) = daemon.upgrade() {
                daemon.on_trigger(trigger);
            }
        });

        // Hold the phase lock so a concurrent shutdown request waits for the outcome
        let mut phase = lock(&self.phase);
        if *phase != Phase::NotStarted {
            return Err(HotkeyError::AlreadyStarted.into());
        }

        self.state.reset_modifiers();
        self.state.set_running(true);
        let mut source = lock(&self.source);
        if let Err(e) = source.start(Arc::new(tracker)) {
            self.state.set_running(false);
            tracing::error!("Failed to start {} key listener: {}", source.name(), e);
            self.publisher.publish(AppStatus::Error);
            return Err(e.into());
        }

        *phase = Phase::Running;
        tracing::info!(
            "Ready. Copy text with {} to ask {}; press Ctrl+Esc to exit",
            modifier.copy_shortcut(),
            self.inference.model()
        );
        Ok(())
    }

    /// Dispatch a trigger from the key thread. Never blocks.
    fn on_trigger(&self, trigger: Trigger) {
        match trigger {
            Trigger::Copy => {
                if !self.state.is_running() {
                    return;
                }
                let state = self.state.clone();
                let processor = self.processor.clone();
                // Give the OS time to land the user's copy before reading
                self.scheduler.schedule(self.config.timing.debounce(), move || {
                    if state.is_running() {
                        processor.process();
                    }
                });
            }
            Trigger::Exit => {
                self.request_shutdown();
            }
        }
    }

    /// Begin shutdown. Returns false if shutdown was already requested.
    pub fn request_shutdown(&self) -> bool {
        let mut phase = lock(&self.phase);
        if matches!(*phase, Phase::Stopping | Phase::Stopped) {
            return false;
        }
        tracing::info!("Shutting down...");
        *phase = Phase::Stopping;

        self.state.set_running(false);
        lock(&self.source).stop();
        self.scheduler.close();
        self.shutdown_tx.send_replace(true);
        true
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Receiver that flips to true once shutdown is requested
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Time the key thread gets to observe the stop before the loop ends
    pub fn shutdown_grace(&self) -> Duration {
        self.config.timing.shutdown_grace()
    }

    /// Block until shutdown is requested (headless mode).
    ///
    /// Must be called from outside the runtime.
    pub fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe_shutdown();
        let _ = self
            .scheduler
            .runtime()
            .block_on(async move { rx.wait_for(|requested| *requested).await.map(|_| ()) });
    }

    /// Wait for background work within the join bound and clean up.
    ///
    /// Returns false if a cycle was still running when the bound expired.
    /// Must be called from outside the runtime.
    pub fn finish(&self) -> bool {
        self.request_shutdown();
        if self.phase() == Phase::Stopped {
            return true;
        }

        let timeout = self.config.timing.join_timeout();
        let joined = self.scheduler.join(timeout);
        if !joined {
            tracing::warn!(
                "Background processing did not finish within {}s, exiting anyway",
                timeout.as_secs()
            );
        }

        self.publisher.cleanup();
        *lock(&self.phase) = Phase::Stopped;
        tracing::info!("Stopped");
        joined
    }
}

/// Route SIGINT (and SIGTERM on Unix) to [`Daemon::request_shutdown`]
pub fn spawn_signal_handler(daemon: &Arc<Daemon>, runtime: &Handle) {
    let daemon = Arc::downgrade(daemon);
    runtime.spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!("Received SIGINT, shutting down...");
                        }
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, shutting down...");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Received SIGINT, shutting down...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down...");
        }

        if let Some(daemon) = daemon.upgrade() {
            daemon.request_shutdown();
        }
    });
}

/// Single-instance lock, released on drop
pub struct InstanceLock {
    lock: Pidlock,
}

impl InstanceLock {
    /// Acquire `<runtime dir>/clipassist.lock`
    pub fn acquire() -> Result<Self, AssistantError> {
        let dir = Config::runtime_dir();
        std::fs::create_dir_all(&dir)?;
        let lock_path = dir.join("clipassist.lock");
        let lock_path_str = lock_path.to_string_lossy().to_string();

        let mut lock = Pidlock::new(&lock_path_str);
        lock.acquire().map_err(|_| {
            AssistantError::Config(format!(
                "Another clipassist instance is already running (lock: {})",
                lock_path.display()
            ))
        })?;
        tracing::debug!("Acquired instance lock at {:?}", lock_path);
        Ok(Self { lock })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::error::InferenceError;
    use crate::hotkey::{Flow, Key, KeyEvent, KeyEventHandler};
    use crate::inference::InferenceResponse;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    type HandlerSlot = Arc<Mutex<Option<Arc<dyn KeyEventHandler>>>>;

    /// Key source driven by the test
    struct ScriptedSource {
        handler: HandlerSlot,
        starts: Arc<AtomicUsize>,
        stopped: Arc<AtomicBool>,
        fail: bool,
    }

    impl KeyEventSource for ScriptedSource {
        fn start(&mut self, handler: Arc<dyn KeyEventHandler>) -> Result<(), HotkeyError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HotkeyError::ListenFailed("no X server".into()));
            }
            *self.handler.lock().unwrap() = Some(handler);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct StubInference {
        available: bool,
        delay: Duration,
        failing: bool,
    }

    impl Inference for StubInference {
        fn check_availability(&self) -> Result<(), InferenceError> {
            if self.available {
                Ok(())
            } else {
                Err(InferenceError::Status {
                    code: 503,
                    body: String::new(),
                })
            }
        }

        fn generate(&self, prompt: &str) -> InferenceResponse {
            std::thread::sleep(self.delay);
            if self.failing {
                return InferenceResponse::Failed(InferenceError::Timeout(self.delay));
            }
            InferenceResponse::Text(prompt.to_uppercase())
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    struct Fixture {
        rt: tokio::runtime::Runtime,
        daemon: Arc<Daemon>,
        clipboard: Arc<MemoryClipboard>,
        handler: HandlerSlot,
        starts: Arc<AtomicUsize>,
        stopped: Arc<AtomicBool>,
    }

    impl Fixture {
        fn send(&self, events: &[KeyEvent]) -> Flow {
            let handler = self.handler.lock().unwrap().clone().expect("source not started");
            let mut flow = Flow::Continue;
            for event in events {
                flow = handler.handle(*event);
            }
            flow
        }
    }

    fn fixture(available: bool, fail_source: bool, delay: Duration) -> Fixture {
        fixture_with(available, fail_source, delay, false)
    }

    fn fixture_with(available: bool, fail_source: bool, delay: Duration, failing: bool) -> Fixture {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let mut config = Config::default();
        config.timing.join_timeout_secs = 1;
        config.timing.shutdown_grace_ms = 10;

        let handler: HandlerSlot = Arc::new(Mutex::new(None));
        let starts = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));
        let source = ScriptedSource {
            handler: handler.clone(),
            starts: starts.clone(),
            stopped: stopped.clone(),
            fail: fail_source,
        };
        let clipboard = Arc::new(MemoryClipboard::new());
        let daemon = Daemon::new(
            Arc::new(config),
            clipboard.clone(),
            Arc::new(StubInference {
                available,
                delay,
                failing,
            }),
            Box::new(source),
            rt.handle().clone(),
        );

        Fixture {
            rt,
            daemon,
            clipboard,
            handler,
            starts,
            stopped,
        }
    }

    fn copy_keys() -> Vec<KeyEvent> {
        let modifier = PlatformModifier::current().key();
        vec![
            KeyEvent::Down(modifier),
            KeyEvent::Down(Key::Character('c')),
            KeyEvent::Up(Key::Character('c')),
            KeyEvent::Up(modifier),
        ]
    }

    fn exit_keys() -> Vec<KeyEvent> {
        vec![
            KeyEvent::Down(Key::Control),
            KeyEvent::Down(Key::Escape),
            KeyEvent::Up(Key::Escape),
        ]
    }

    #[test]
    fn test_unavailable_server_keeps_listener_detached() {
        let f = fixture(false, false, Duration::ZERO);
        assert!(f.daemon.start().is_err());

        assert_eq!(f.daemon.phase(), Phase::NotStarted);
        assert_eq!(f.daemon.publisher().current(), AppStatus::Error);
        assert_eq!(f.starts.load(Ordering::SeqCst), 0);
        assert!(!f.daemon.state().is_running());

        // The user can still exit from the tray
        assert!(f.daemon.request_shutdown());
        assert!(f.daemon.finish());
        assert_eq!(f.daemon.phase(), Phase::Stopped);
    }

    #[test]
    fn test_listener_failure_is_reported() {
        let f = fixture(true, true, Duration::ZERO);
        let err = f.daemon.start().unwrap_err();
        assert!(matches!(err, AssistantError::Hotkey(HotkeyError::ListenFailed(_))));
        assert_eq!(f.daemon.publisher().current(), AppStatus::Error);
        assert!(!f.daemon.state().is_running());
        assert_eq!(f.daemon.phase(), Phase::NotStarted);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let f = fixture(true, false, Duration::ZERO);
        f.daemon.start().unwrap();
        assert_eq!(f.daemon.phase(), Phase::Running);
        assert!(f.daemon.state().is_running());
        assert!(f.daemon.start().is_err());
        assert_eq!(f.starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_copy_shortcut_processes_after_debounce() {
        let f = fixture(true, false, Duration::ZERO);
        f.daemon.start().unwrap();
        f.clipboard.set("hello");

        assert_eq!(f.send(&copy_keys()), Flow::Continue);
        // Debounced: nothing happened yet
        assert_eq!(f.clipboard.get(), "hello");

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(f.clipboard.get(), "HELLO");
        assert_eq!(f.daemon.publisher().current(), AppStatus::Idle);
    }

    #[test]
    fn test_exit_shortcut_stops_listener() {
        let f = fixture(true, false, Duration::ZERO);
        f.daemon.start().unwrap();

        assert_eq!(f.send(&exit_keys()), Flow::Stop);
        assert_eq!(f.daemon.phase(), Phase::Stopping);
        assert!(f.daemon.shutdown_requested());
        assert!(f.stopped.load(Ordering::SeqCst));
        assert!(!f.daemon.request_shutdown());

        assert!(f.daemon.finish());
        assert_eq!(f.daemon.phase(), Phase::Stopped);
    }

    #[test]
    fn test_exit_cancels_pending_debounce() {
        let f = fixture(true, false, Duration::ZERO);
        f.daemon.start().unwrap();
        f.clipboard.set("never sent");

        f.send(&copy_keys());
        f.send(&exit_keys());
        std::thread::sleep(Duration::from_millis(300));

        assert_eq!(f.clipboard.get(), "never sent");
        assert!(f.daemon.finish());
    }

    #[test]
    fn test_exit_mid_cycle_is_bounded() {
        let f = fixture(true, false, Duration::from_secs(3));
        f.daemon.start().unwrap();
        f.clipboard.set("slow");
        f.send(&copy_keys());

        // Let the cycle get into generate()
        std::thread::sleep(Duration::from_millis(300));
        assert!(f.daemon.state().is_processing());

        f.send(&exit_keys());
        let started = std::time::Instant::now();
        assert!(!f.daemon.finish());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(f.daemon.phase(), Phase::Stopped);

        let Fixture { rt, .. } = f;
        rt.shutdown_background();
    }

    #[test]
    fn test_failure_after_exit_does_not_delay_finish() {
        // Cooldown (3s) longer than the join bound (1s)
        let f = fixture_with(true, false, Duration::from_millis(300), true);
        f.daemon.start().unwrap();
        f.clipboard.set("doomed");
        f.send(&copy_keys());

        std::thread::sleep(Duration::from_millis(150));
        assert!(f.daemon.state().is_processing());
        f.send(&exit_keys());

        let started = std::time::Instant::now();
        assert!(f.daemon.finish());
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(f.clipboard.get(), "Error: Request to Ollama timed out after 0s");
        assert!(!f.daemon.state().is_processing());
    }

    #[test]
    fn test_wait_for_shutdown_returns_after_request() {
        let f = fixture(true, false, Duration::ZERO);
        f.daemon.start().unwrap();

        let daemon = f.daemon.clone();
        let waiter = std::thread::spawn(move || daemon.wait_for_shutdown());
        std::thread::sleep(Duration::from_millis(50));
        f.daemon.request_shutdown();
        waiter.join().unwrap();
        assert!(f.daemon.finish());
    }
}
