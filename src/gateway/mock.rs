//! Scripted text generator for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{GatewayError, GenerateRequest, TextGenerator};

/// Replays a fixed list of attempt outcomes, then falls back to a default.
///
/// Records the (tokio) instant of each call so tests running with paused
/// time can check the backoff schedule exactly.
pub(crate) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Option<String>, GatewayError>>>,
    fallback: Result<Option<String>, GatewayError>,
    call_count: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Vec<Result<Option<String>, GatewayError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Err(GatewayError::Transport("script exhausted".to_string())),
            call_count: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
        }
    }

    /// Every attempt succeeds with `text`
    pub(crate) fn replying(text: impl Into<String>) -> Self {
        let mut generator = Self::new(vec![]);
        generator.fallback = Ok(Some(text.into()));
        generator
    }

    /// Every attempt fails with `err`
    pub(crate) fn always_failing(err: GatewayError) -> Self {
        let mut generator = Self::new(vec![]);
        generator.fallback = Err(err);
        generator
    }

    pub(crate) fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Time elapsed between consecutive calls
    pub(crate) fn gaps_between_calls(&self) -> Vec<Duration> {
        let times = self.call_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub(crate) fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, GatewayError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        *self.last_request.lock().unwrap() = Some(request.clone());

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}
