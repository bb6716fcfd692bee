//! Resilient Call Gateway
//!
//! One logical request to a text-generation service, retried with
//! exponential backoff. The retry loop is an explicit state machine:
//!
//! ```text
//!   Attempting(n) ──ok──────────────────────────► Succeeded
//!        │
//!        └─err──► n < max && retryable ──► Backoff(n, delay) ──elapsed──► Attempting(n+1)
//!                 otherwise ─────────────► Failed(last error)
//! ```
//!
//! [`CallState::next`] is pure; [`Gateway::call`] drives it, performing the
//! request on `Attempting` and sleeping on `Backoff`.

pub mod gemini;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Errors from the text-generation call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Network or connectivity failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("Provider returned HTTP {status}: {body}")]
    NonSuccessResponse { status: u16, body: String },

    /// Success status, but the body was not a response envelope
    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    /// The prompt was empty; nothing was sent
    #[error("Prompt is empty")]
    EmptyInput,

    /// No API key configured; nothing was sent
    #[error("No API key configured (set GEMINI_API_KEY)")]
    MissingCredential,
}

impl GatewayError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_)
                | GatewayError::NonSuccessResponse { .. }
                | GatewayError::MalformedEnvelope(_)
        )
    }
}

/// A prompt plus optional system instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
        }
    }

    /// Attach a system instruction; an empty one is dropped
    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }
}

/// Transport for a single attempt (allows mocking in tests)
///
/// `Ok(None)` means the provider answered successfully but the expected text
/// field was absent from the envelope.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, GatewayError>;
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each further failure
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_delay_ms).saturating_mul(factor)
    }
}

/// State of one logical call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    /// Performing attempt `n` (1-based)
    Attempting(u32),
    /// Attempt `n` failed; waiting `delay` before the next one
    Backoff(u32, Duration),
    Succeeded(Option<String>),
    Failed(GatewayError),
}

/// What happened in the current state
#[derive(Debug, Clone)]
pub enum CallEvent {
    AttemptSucceeded(Option<String>),
    AttemptFailed(GatewayError),
    BackoffElapsed,
}

impl CallState {
    pub fn start() -> Self {
        CallState::Attempting(1)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded(_) | CallState::Failed(_))
    }

    /// Apply `event`. Events that make no sense in the current state
    /// (including any event in a terminal state) leave it unchanged.
    pub fn next(self, event: CallEvent, policy: &RetryPolicy) -> CallState {
        match (self, event) {
            (CallState::Attempting(_), CallEvent::AttemptSucceeded(text)) => {
                CallState::Succeeded(text)
            }
            (CallState::Attempting(n), CallEvent::AttemptFailed(err)) => {
                if n < policy.max_attempts && err.is_retryable() {
                    CallState::Backoff(n, policy.delay_after(n))
                } else {
                    CallState::Failed(err)
                }
            }
            (CallState::Backoff(n, _), CallEvent::BackoffElapsed) => CallState::Attempting(n + 1),
            (state, _) => state,
        }
    }
}

/// Retrying wrapper around a [`TextGenerator`]
#[derive(Clone)]
pub struct Gateway {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl Gateway {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `prompt` (with an optional system instruction), retrying per the
    /// policy. After the last attempt fails, that attempt's error is returned.
    pub async fn call(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> Result<Option<String>, GatewayError> {
        if prompt.trim().is_empty() {
            return Err(GatewayError::EmptyInput);
        }

        let mut request = GenerateRequest::new(prompt);
        if let Some(system) = system_instruction {
            request = request.with_system(system);
        }

        let mut state = CallState::start();
        loop {
            state = match state {
                CallState::Attempting(attempt) => {
                    tracing::debug!(attempt, "Text generation attempt");
                    let event = match self.generator.generate(&request).await {
                        Ok(text) => CallEvent::AttemptSucceeded(text),
                        Err(err) => {
                            tracing::warn!(attempt, error = %err, "Text generation attempt failed");
                            CallEvent::AttemptFailed(err)
                        }
                    };
                    CallState::Attempting(attempt).next(event, &self.policy)
                }
                CallState::Backoff(attempt, delay) => {
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    CallState::Backoff(attempt, delay).next(CallEvent::BackoffElapsed, &self.policy)
                }
                CallState::Succeeded(text) => {
                    if text.is_none() {
                        tracing::warn!("Provider response had no text field");
                    }
                    return Ok(text);
                }
                CallState::Failed(err) => {
                    tracing::error!(error = %err, "Text generation failed");
                    return Err(err);
                }
            };
        }
    }
}
