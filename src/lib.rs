//! decision-log - Decision journal with AI assistance
//!
//! Log what happened, how critical it was, what you did and what came of
//! it. Optionally ask a text-generation model to draft the action/result
//! for a situation, or to spot patterns across everything logged so far.
//!
//! Everything lives in memory for the session; export to CSV to keep it.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use decision_log::{AppConfig, Session, Criticality};
//!
//! let config = AppConfig::load(None)?;
//! let mut session = Session::from_config(&config);
//!
//! session.draft_mut().situation = "Instabilidade no servidor de produção".into();
//! session.draft_mut().criticality = Criticality::UrgentImportant;
//! session.request_suggestion().await?;   // fills action + result
//! let id = session.submit()?;
//!
//! session.request_analysis().await?;
//! let path = session.export(&config.export_dir())?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              REPL (decision-log)             │
//! └──────────────────────┬───────────────────────┘
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ Session: draft, insights, loading flag       │
//! │   ├── RecordStore   append/remove/all/CSV    │
//! │   └── AssistEngine  suggest / analyze        │
//! │         └── Gateway  retry + backoff         │
//! │               └── TextGenerator (Gemini)     │
//! └──────────────────────────────────────────────┘
//! ```

pub mod assist;
pub mod config;
pub mod gateway;
pub mod session;
pub mod store;
pub mod types;

pub use assist::{AssistEngine, AssistError, Suggestion, SuggestionFailurePolicy};
pub use config::AppConfig;
pub use gateway::gemini::GeminiClient;
pub use gateway::{CallState, Gateway, GatewayError, RetryPolicy, TextGenerator};
pub use session::{Session, SessionError};
pub use store::{export_file_name, RecordStore};
pub use types::*;
