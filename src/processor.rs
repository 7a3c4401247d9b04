//! Single-flight clipboard processor
//!
//! One cycle: read the clipboard, skip if unchanged or blank, ask the model,
//! write the answer (or the error message) back, publish the new status.
//! At most one cycle runs at a time; a trigger that arrives while a cycle is
//! in flight is dropped, never queued.

use crate::clipboard::{preview, Clipboard};
use crate::inference::{Inference, InferenceResponse};
use crate::scheduler::Scheduler;
use crate::state::{AppStatus, RunState, StatusPublisher};
use std::sync::Arc;
use std::time::Duration;

/// What a call to [`Processor::process`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Another cycle was in flight
    Busy,
    /// Clipboard text equals the last processed text
    Unchanged,
    /// Clipboard is empty or whitespace only
    Empty,
    /// The model answered and the answer is on the clipboard
    Answered,
    /// The request failed and the error message is on the clipboard
    Failed,
    /// The clipboard could not be read or written
    ClipboardFailed,
}

pub struct Processor {
    state: Arc<RunState>,
    clipboard: Arc<dyn Clipboard>,
    inference: Arc<dyn Inference>,
    publisher: Arc<StatusPublisher>,
    scheduler: Arc<Scheduler>,
    error_cooldown: Duration,
}

impl Processor {
    pub fn new(
        state: Arc<RunState>,
        clipboard: Arc<dyn Clipboard>,
        inference: Arc<dyn Inference>,
        publisher: Arc<StatusPublisher>,
        scheduler: Arc<Scheduler>,
        error_cooldown: Duration,
    ) -> Self {
        Self {
            state,
            clipboard,
            inference,
            publisher,
            scheduler,
            error_cooldown,
        }
    }

    /// Run one cycle, or return [`Outcome::Busy`] immediately.
    ///
    /// Blocks for the duration of the inference call.
    pub fn process(&self) -> Outcome {
        let Some(_guard) = self.state.try_begin_processing() else {
            tracing::debug!("Processing already in flight, ignoring trigger");
            return Outcome::Busy;
        };

        let text = match self.clipboard.read_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("{}", e);
                self.fail();
                return Outcome::ClipboardFailed;
            }
        };

        if text.trim().is_empty() {
            tracing::debug!("Clipboard is empty, nothing to do");
            return Outcome::Empty;
        }

        if !self.state.remember_clipboard(&text) {
            tracing::debug!("Clipboard unchanged, skipping request");
            return Outcome::Unchanged;
        }

        tracing::info!(
            "Sending {} chars to {} ({})",
            text.len(),
            self.inference.model(),
            self.clipboard.name()
        );
        tracing::debug!("Prompt: {:?}", preview(&text, 80));
        self.publisher.publish(AppStatus::Processing);

        let response = self.inference.generate(&text);
        let answer = response.clipboard_text();

        if let Err(e) = self.clipboard.write_text(&answer) {
            tracing::error!("{}", e);
            self.fail();
            return Outcome::ClipboardFailed;
        }

        match response {
            InferenceResponse::Text(_) => {
                tracing::info!("Response copied to clipboard ({} chars)", answer.len());
                self.publisher.publish(AppStatus::Idle);
                Outcome::Answered
            }
            InferenceResponse::Failed(_) => {
                tracing::warn!("Error message copied to clipboard: {}", answer);
                self.fail();
                Outcome::Failed
            }
        }
    }

    /// Show Error, then fall back to Idle after the cooldown
    fn fail(&self) {
        self.publisher.publish(AppStatus::Error);
        let publisher = self.publisher.clone();
        self.scheduler.schedule(self.error_cooldown, move || {
            publisher.reset_error();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryClipboard;
    use crate::error::{ClipboardError, InferenceError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};

    /// Answers with a canned reply and records prompts
    struct FakeInference {
        reply: Mutex<Option<InferenceError>>,
        prompts: Mutex<Vec<String>>,
        gate: Option<Arc<Barrier>>,
    }

    impl FakeInference {
        fn answering() -> Self {
            Self {
                reply: Mutex::new(None),
                prompts: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn failing(error: InferenceError) -> Self {
            Self {
                reply: Mutex::new(Some(error)),
                ..Self::answering()
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl Inference for FakeInference {
        fn check_availability(&self) -> Result<(), InferenceError> {
            Ok(())
        }

        fn generate(&self, prompt: &str) -> InferenceResponse {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(gate) = &self.gate {
                gate.wait();
                gate.wait();
            }
            match self.reply.lock().unwrap().take() {
                Some(e) => InferenceResponse::Failed(e),
                None => InferenceResponse::Text(format!("ANSWER to {}", prompt)),
            }
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    struct BrokenClipboard;

    impl Clipboard for BrokenClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            Err(ClipboardError::Read("no display".into()))
        }

        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Write("no display".into()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct Harness {
        _rt: tokio::runtime::Runtime,
        state: Arc<RunState>,
        clipboard: Arc<MemoryClipboard>,
        inference: Arc<FakeInference>,
        publisher: Arc<StatusPublisher>,
        processor: Arc<Processor>,
    }

    fn harness(inference: FakeInference, cooldown: Duration) -> Harness {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()
            .unwrap();
        let state = Arc::new(RunState::new());
        let clipboard = Arc::new(MemoryClipboard::new());
        let inference = Arc::new(inference);
        let publisher = Arc::new(StatusPublisher::default());
        let scheduler = Arc::new(Scheduler::new(rt.handle().clone()));
        let processor = Arc::new(Processor::new(
            state.clone(),
            clipboard.clone(),
            inference.clone(),
            publisher.clone(),
            scheduler,
            cooldown,
        ));
        Harness {
            _rt: rt,
            state,
            clipboard,
            inference,
            publisher,
            processor,
        }
    }

    #[test]
    fn test_round_trip_replaces_clipboard() {
        let h = harness(FakeInference::answering(), Duration::from_secs(3));
        h.clipboard.set("What is 2+2?");

        assert_eq!(h.processor.process(), Outcome::Answered);
        assert_eq!(h.clipboard.get(), "ANSWER to What is 2+2?");
        assert_eq!(h.state.previous_clipboard(), "What is 2+2?");
        assert_eq!(h.publisher.current(), AppStatus::Idle);
        assert!(!h.state.is_processing());
    }

    #[test]
    fn test_unchanged_clipboard_is_not_resent() {
        let h = harness(FakeInference::answering(), Duration::from_secs(3));
        h.clipboard.set("prompt");
        assert_eq!(h.processor.process(), Outcome::Answered);

        // The same prompt copied again is not new
        h.clipboard.set("prompt");
        assert_eq!(h.processor.process(), Outcome::Unchanged);
        assert_eq!(h.inference.calls(), 1);

        // The answer itself is new text
        h.clipboard.set("ANSWER to prompt");
        assert_eq!(h.processor.process(), Outcome::Answered);
        assert_eq!(h.inference.calls(), 2);
    }

    #[test]
    fn test_blank_clipboard_never_sends() {
        let h = harness(FakeInference::answering(), Duration::from_secs(3));
        for blank in ["", "   ", "\n\t \n"] {
            h.clipboard.set(blank);
            assert_eq!(h.processor.process(), Outcome::Empty);
        }
        assert_eq!(h.inference.calls(), 0);
        assert_eq!(h.state.previous_clipboard(), "");
        assert_eq!(h.publisher.current(), AppStatus::Idle);
    }

    #[test]
    fn test_failure_writes_error_and_cools_down() {
        let h = harness(
            FakeInference::failing(InferenceError::Status {
                code: 500,
                body: "model crashed".into(),
            }),
            Duration::from_millis(100),
        );
        h.clipboard.set("question");

        assert_eq!(h.processor.process(), Outcome::Failed);
        assert_eq!(
            h.clipboard.get(),
            "Error: Could not get response from Ollama (Status code: 500)"
        );
        assert_eq!(h.publisher.current(), AppStatus::Error);
        assert!(!h.state.is_processing());

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(h.publisher.current(), AppStatus::Idle);
    }

    #[test]
    fn test_cooldown_does_not_clobber_newer_cycle() {
        let h = harness(
            FakeInference::failing(InferenceError::Timeout(Duration::from_secs(60))),
            Duration::from_millis(100),
        );
        h.clipboard.set("question");
        assert_eq!(h.processor.process(), Outcome::Failed);

        // A newer cycle took over before the cooldown elapsed
        h.publisher.publish(AppStatus::Processing);
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(h.publisher.current(), AppStatus::Processing);
    }

    #[test]
    fn test_clipboard_read_error_releases_guard() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();
        let state = Arc::new(RunState::new());
        let publisher = Arc::new(StatusPublisher::default());
        let inference = Arc::new(FakeInference::answering());
        let processor = Processor::new(
            state.clone(),
            Arc::new(BrokenClipboard),
            inference.clone(),
            publisher.clone(),
            Arc::new(Scheduler::new(rt.handle().clone())),
            Duration::from_millis(50),
        );

        assert_eq!(processor.process(), Outcome::ClipboardFailed);
        assert!(!state.is_processing());
        assert_eq!(inference.calls(), 0);
        assert_eq!(publisher.current(), AppStatus::Error);

        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(publisher.current(), AppStatus::Idle);
    }

    #[test]
    fn test_overlapping_triggers_are_dropped() {
        let gate = Arc::new(Barrier::new(2));
        let inference = FakeInference {
            gate: Some(gate.clone()),
            ..FakeInference::answering()
        };
        let h = harness(inference, Duration::from_secs(3));
        h.clipboard.set("slow question");

        let processor = h.processor.clone();
        let first = std::thread::spawn(move || processor.process());

        // First cycle is now inside generate()
        gate.wait();
        assert!(h.state.is_processing());
        assert_eq!(h.publisher.current(), AppStatus::Processing);

        let dropped = AtomicUsize::new(0);
        for _ in 0..5 {
            if h.processor.process() == Outcome::Busy {
                dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 5);

        gate.wait();
        assert_eq!(first.join().unwrap(), Outcome::Answered);
        assert_eq!(h.inference.calls(), 1);
        assert!(!h.state.is_processing());
    }
}
