//! Language model inference
//!
//! A generation never fails from the caller's point of view: the response
//! is either the model's text or an error descriptor whose user-facing
//! message is placed on the clipboard instead. Only the availability probe
//! returns a `Result`.

pub mod ollama;

use crate::error::InferenceError;
use serde::Serialize;

/// Text substituted when the server answers without a `response` field
pub const NO_RESPONSE_FALLBACK: &str = "No response from model";

/// Body of a non-streaming generate call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    stream: bool,
}

impl InferenceRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

/// Outcome of a generate call
#[derive(Debug)]
pub enum InferenceResponse {
    /// Generated text (possibly the fallback text)
    Text(String),
    /// The request failed; the clipboard gets [`InferenceError::user_message`]
    Failed(InferenceError),
}

impl InferenceResponse {
    /// What ends up on the clipboard
    pub fn clipboard_text(&self) -> String {
        match self {
            InferenceResponse::Text(text) => text.clone(),
            InferenceResponse::Failed(e) => e.user_message(),
        }
    }
}

/// Trait for inference backends
pub trait Inference: Send + Sync {
    /// Bounded probe; Ok if the server answered 200
    fn check_availability(&self) -> Result<(), InferenceError>;

    /// Bounded, non-streaming generation for `prompt`
    fn generate(&self, prompt: &str) -> InferenceResponse;

    /// Model identifier sent with each request
    fn model(&self) -> &str;
}
