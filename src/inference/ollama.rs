//! Ollama HTTP client
//!
//! Talks to a locally running Ollama instance:
//! - `GET /api/tags` as the availability probe (also lists pulled models)
//! - `POST /api/generate` with `stream: false` for answers
//!
//! Both calls are blocking and bounded by a timeout; callers run them on
//! the blocking pool.

use super::{Inference, InferenceRequest, InferenceResponse, NO_RESPONSE_FALLBACK};
use crate::config::Config;
use crate::error::InferenceError;
use serde::Deserialize;
use std::time::Duration;

/// Longest error body kept for logs
const MAX_ERROR_BODY: usize = 200;

/// Ollama-based inference client
pub struct OllamaClient {
    /// Base URL without trailing slash
    url: String,
    /// Model name
    model: String,
    /// Generate request timeout
    request_timeout: Duration,
    /// Availability probe timeout
    availability_timeout: Duration,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Option<Vec<ModelInfo>>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    pub fn new(url: &str, model: &str, request_timeout: Duration, availability_timeout: Duration) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            request_timeout,
            availability_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.server.url,
            &config.model,
            config.server.request_timeout(),
            config.server.availability_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Names of the models the server has pulled
    pub fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let response = self.get_tags()?;
        let tags: TagsResponse = response
            .into_json()
            .map_err(|e| InferenceError::Malformed(format!("tags response: {}", e)))?;
        Ok(tags
            .models
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.name)
            .collect())
    }

    fn get_tags(&self) -> Result<ureq::Response, InferenceError> {
        let client = ureq::AgentBuilder::new()
            .timeout(self.availability_timeout)
            .build();

        let tags_url = format!("{}/api/tags", self.url);
        let response = client
            .get(&tags_url)
            .call()
            .map_err(|e| self.classify(e, self.availability_timeout))?;
        require_ok(response)
    }

    /// Translate a ureq error into the inference taxonomy
    fn classify(&self, e: ureq::Error, limit: Duration) -> InferenceError {
        match e {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                InferenceError::Status {
                    code,
                    body: crate::clipboard::preview(body.trim(), MAX_ERROR_BODY),
                }
            }
            ureq::Error::Transport(t) => {
                let msg = t.to_string();
                let io_timeout = std::error::Error::source(&t)
                    .and_then(|source| source.downcast_ref::<std::io::Error>())
                    .is_some_and(|io| {
                        matches!(
                            io.kind(),
                            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                        )
                    });
                if io_timeout || msg.contains("timed out") || msg.contains("timeout") {
                    InferenceError::Timeout(limit)
                } else {
                    InferenceError::Unreachable {
                        url: self.url.clone(),
                        reason: msg,
                    }
                }
            }
        }
    }

    fn request_generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let client = ureq::AgentBuilder::new()
            .timeout(self.request_timeout)
            .build();

        let generate_url = format!("{}/api/generate", self.url);
        let request = InferenceRequest::new(self.model.as_str(), prompt);

        tracing::debug!("Calling Ollama generate API with model: {}", self.model);

        let response = client
            .post(&generate_url)
            .send_json(&request)
            .map_err(|e| self.classify(e, self.request_timeout))?;
        let response = require_ok(response)?;

        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| InferenceError::Malformed(e.to_string()))?;

        match body.get("response").and_then(|v| v.as_str()) {
            Some(text) => Ok(text.to_string()),
            None => {
                tracing::warn!("Ollama reply has no response field, using fallback text");
                Ok(NO_RESPONSE_FALLBACK.to_string())
            }
        }
    }
}

impl Inference for OllamaClient {
    fn check_availability(&self) -> Result<(), InferenceError> {
        let response = self.get_tags()?;
        tracing::info!("Ollama reachable at {}", self.url);

        // Don't fail on the listing: a 200 is enough, and Ollama pulls on first use
        let models = match response.into_json::<TagsResponse>() {
            Ok(tags) => tags.models.unwrap_or_default(),
            Err(e) => {
                tracing::debug!("Could not parse model listing: {}", e);
                return Ok(());
            }
        };

        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        if !model_listed(&self.model, &names) {
            tracing::warn!(
                "Model '{}' not found in Ollama. Available models: {:?}",
                self.model,
                names
            );
        }

        Ok(())
    }

    fn generate(&self, prompt: &str) -> InferenceResponse {
        match self.request_generate(prompt) {
            Ok(text) => {
                tracing::debug!("Received response ({} chars)", text.len());
                InferenceResponse::Text(text)
            }
            Err(e) => {
                tracing::error!("Generation failed: {}", e);
                InferenceResponse::Failed(e)
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama answers 200; any other success code is treated as an error
fn require_ok(response: ureq::Response) -> Result<ureq::Response, InferenceError> {
    let code = response.status();
    if code == 200 {
        return Ok(response);
    }
    let body = response.into_string().unwrap_or_default();
    Err(InferenceError::Status {
        code,
        body: crate::clipboard::preview(body.trim(), MAX_ERROR_BODY),
    })
}

/// Whether `model` is among `available`, by full name or by base name
pub fn model_listed(model: &str, available: &[&str]) -> bool {
    let model_base = model.split(':').next().unwrap_or(model);
    available.iter().any(|name| {
        let base = name.split(':').next().unwrap_or(name);
        *name == model || base == model_base
    })
}
