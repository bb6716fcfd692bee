//! Per-session state
//!
//! Owns everything that lives for one session: the record store, the form
//! draft, the latest insights and the `loading` flag. Nothing is
//! global; a session is created at startup and dropped at exit.
//!
//! The AI-backed operations borrow the session immutably while the request
//! is in flight, so the `loading` flag is observable (and enforced) for any
//! other operation polled concurrently on the same task.

use crate::assist::{AssistEngine, AssistError, Suggestion};
use crate::config::AppConfig;
use crate::gateway::gemini::GeminiClient;
use crate::gateway::Gateway;
use crate::store::RecordStore;
use crate::types::{RecordDraft, RecordId, ValidationError};
use anyhow::Result;
use chrono::Local;
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Assist(#[from] AssistError),

    /// Another AI operation is still running
    #[error("An AI request is already in progress")]
    Busy,
}

/// Clears the loading flag when the request finishes, however it finishes
struct LoadingGuard<'a>(&'a Cell<bool>);

impl<'a> LoadingGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Result<Self, SessionError> {
        if flag.replace(true) {
            return Err(SessionError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct Session {
    store: RecordStore,
    draft: RecordDraft,
    insights: Option<String>,
    loading: Cell<bool>,
    assist: AssistEngine,
}

impl Session {
    pub fn new(assist: AssistEngine) -> Self {
        Self {
            store: RecordStore::new(),
            draft: RecordDraft::default(),
            insights: None,
            loading: Cell::new(false),
            assist,
        }
    }

    /// Session wired to the Gemini endpoint described by `config`
    pub fn from_config(config: &AppConfig) -> Self {
        let client = GeminiClient::from_config(config);
        tracing::info!(model = client.model(), has_key = config.has_api_key(), "Session started");
        let gateway = Gateway::new(Arc::new(client), config.retry.clone());
        Self::new(AssistEngine::new(gateway, config.on_suggestion_failure))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn draft(&self) -> &RecordDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut RecordDraft {
        &mut self.draft
    }

    pub fn reset_draft(&mut self) {
        self.draft = RecordDraft::default();
    }

    pub fn insights(&self) -> Option<&str> {
        self.insights.as_deref()
    }

    pub fn clear_insights(&mut self) {
        self.insights = None;
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Turn the draft into a record. The draft is reset only on success.
    pub fn submit(&mut self) -> Result<RecordId, SessionError> {
        let id = self.store.create(self.draft.clone())?.id;
        self.reset_draft();
        tracing::info!(id, total = self.store.len(), "Record saved");
        Ok(id)
    }

    /// Remove a record; unknown ids are ignored
    pub fn delete(&mut self, id: RecordId) -> bool {
        self.store.remove(id)
    }

    /// Write today's CSV export into `dir`
    pub fn export(&self, dir: &Path) -> Result<PathBuf> {
        self.store.write_export(dir, Local::now().date_naive())
    }

    /// Suggest an action/result for the current draft without applying it
    pub async fn suggest(&self) -> Result<Option<Suggestion>, SessionError> {
        let _guard = LoadingGuard::acquire(&self.loading)?;
        let suggestion = self
            .assist
            .suggest(&self.draft.situation, self.draft.criticality)
            .await?;
        Ok(suggestion)
    }

    /// Fill the draft's action and result, keeping situation and criticality
    pub fn apply_suggestion(&mut self, suggestion: Suggestion) {
        self.draft.action = suggestion.action;
        self.draft.result = suggestion.result;
    }

    /// Suggest and apply. Returns whether the draft changed.
    pub async fn request_suggestion(&mut self) -> Result<bool, SessionError> {
        match self.suggest().await? {
            Some(suggestion) => {
                self.apply_suggestion(suggestion);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Analyze all records without storing the result
    pub async fn analyze(&self) -> Result<Option<String>, SessionError> {
        let _guard = LoadingGuard::acquire(&self.loading)?;
        let insights = self.assist.analyze_patterns(self.store.all()).await?;
        Ok(insights)
    }

    /// Analyze and replace the session's insights with the result.
    /// An answer without text clears them; a failed call keeps them.
    pub async fn request_analysis(&mut self) -> Result<Option<&str>, SessionError> {
        self.insights = self.analyze().await?;
        Ok(self.insights.as_deref())
    }
}
