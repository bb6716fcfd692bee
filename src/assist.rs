//! AI-assisted suggestion and pattern analysis
//!
//! Two call sites on top of the [`Gateway`]:
//! - **Suggestion**: given a situation and criticality, propose an action
//!   and a result. The provider is asked for JSON but not trusted to honor
//!   it: code fences are stripped and the action is re-truncated locally.
//! - **Pattern analysis**: send the whole record set, get back a few short
//!   strategic observations as free text.

use crate::gateway::{Gateway, GatewayError};
use crate::types::{truncate_chars, Criticality, DecisionRecord, ACTION_MAX_CHARS};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const SUGGESTION_SYSTEM_PROMPT: &str =
    "Você é um mentor de carreira e gestão de processos experiente.";

pub const ANALYSIS_SYSTEM_PROMPT: &str = "Você é um consultor de operações sênior.";

/// Number of observations requested from pattern analysis
pub const INSIGHT_COUNT: usize = 3;

/// What to do when a suggestion cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionFailurePolicy {
    /// Return the failure to the caller
    Report,
    /// Log it and leave the draft untouched
    #[default]
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown suggestion failure policy '{0}' (expected 'report' or 'ignore')")]
pub struct ParsePolicyError(String);

impl FromStr for SuggestionFailurePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(SuggestionFailurePolicy::Report),
            "ignore" => Ok(SuggestionFailurePolicy::Ignore),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Provider text was not the expected JSON payload
    #[error("Could not parse suggestion: {0}")]
    StructuralParse(String),

    /// A required input is missing; nothing was sent
    #[error("{0}")]
    EmptyInput(&'static str),

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Proposed action and result for a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "acao", alias = "action")]
    pub action: String,
    #[serde(rename = "resultado", alias = "result")]
    pub result: String,
}

/// Suggestion and analysis engine
///
/// ```rust,ignore
/// let engine = AssistEngine::new(gateway, SuggestionFailurePolicy::Report);
/// if let Some(s) = engine.suggest("Servidor caiu", Criticality::UrgentImportant).await? {
///     println!("{} -> {}", s.action, s.result);
/// }
/// ```
#[derive(Clone)]
pub struct AssistEngine {
    gateway: Gateway,
    on_failure: SuggestionFailurePolicy,
}

impl AssistEngine {
    pub fn new(gateway: Gateway, on_failure: SuggestionFailurePolicy) -> Self {
        Self { gateway, on_failure }
    }

    pub fn failure_policy(&self) -> SuggestionFailurePolicy {
        self.on_failure
    }

    /// Ask for an action/result pair.
    ///
    /// Gateway failures are always returned. A parse failure is returned
    /// under [`SuggestionFailurePolicy::Report`] and turns into `Ok(None)`
    /// under [`SuggestionFailurePolicy::Ignore`].
    pub async fn suggest(
        &self,
        situation: &str,
        criticality: Criticality,
    ) -> Result<Option<Suggestion>, AssistError> {
        if situation.trim().is_empty() {
            return Err(AssistError::EmptyInput("situation is required for a suggestion"));
        }

        let prompt = build_suggestion_prompt(situation, criticality);
        let text = self
            .gateway
            .call(&prompt, Some(SUGGESTION_SYSTEM_PROMPT))
            .await?;

        let parsed = match text {
            Some(text) => parse_suggestion(&text),
            None => Err(AssistError::StructuralParse(
                "provider returned no text".to_string(),
            )),
        };

        match (parsed, self.on_failure) {
            (Ok(suggestion), _) => Ok(Some(suggestion)),
            (Err(err), SuggestionFailurePolicy::Ignore) => {
                tracing::error!(error = %err, "Suggestion discarded");
                Ok(None)
            }
            (Err(err), SuggestionFailurePolicy::Report) => Err(err),
        }
    }

    /// Ask for strategic observations over `records`; the text is returned
    /// verbatim
    pub async fn analyze_patterns(
        &self,
        records: &[DecisionRecord],
    ) -> Result<Option<String>, AssistError> {
        if records.is_empty() {
            return Err(AssistError::EmptyInput("no records to analyze"));
        }

        let prompt = build_analysis_prompt(records)?;
        tracing::info!(records = records.len(), "Requesting pattern analysis");
        Ok(self
            .gateway
            .call(&prompt, Some(ANALYSIS_SYSTEM_PROMPT))
            .await?)
    }
}

pub fn build_suggestion_prompt(situation: &str, criticality: Criticality) -> String {
    format!(
        "Com base na situação: \"{situation}\" e criticidade: \"{criticality}\", sugira uma \
         'ação tomada' (máx {max} caracteres) e um 'resultado' (focado em impacto no negócio). \
         Responda estritamente em formato JSON: {{\"acao\": \"...\", \"resultado\": \"...\"}}",
        situation = situation.trim(),
        criticality = criticality.label(),
        max = ACTION_MAX_CHARS,
    )
}

pub fn build_analysis_prompt(records: &[DecisionRecord]) -> Result<String, serde_json::Error> {
    let data = serde_json::to_string(records)?;
    Ok(format!(
        "Analise estes registros de decisões e forneça {INSIGHT_COUNT} insights estratégicos \
         curtos sobre a performance ou processos. Seja direto e executivo. Dados: {data}"
    ))
}

/// Remove every ```` ```json ```` and ```` ``` ```` marker, then trim
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse provider text into a suggestion, enforcing the action bound
pub fn parse_suggestion(text: &str) -> Result<Suggestion, AssistError> {
    let cleaned = strip_code_fences(text);
    let mut suggestion: Suggestion = serde_json::from_str(&cleaned)
        .map_err(|e| AssistError::StructuralParse(e.to_string()))?;

    suggestion.action = truncate_chars(&suggestion.action, ACTION_MAX_CHARS);
    Ok(suggestion)
}
