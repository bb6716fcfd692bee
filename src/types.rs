//! Core types for the decision log
//!
//! A decision record captures one situation, how critical it was
//! (Eisenhower matrix), what was done about it and what came of it.
//! Records are immutable once created; the only mutation is deletion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Maximum length of a situation, in characters
pub const SITUATION_MAX_CHARS: usize = 100;

/// Maximum length of an action, in characters
pub const ACTION_MAX_CHARS: usize = 240;

/// Counter turns to a warning at this many situation characters
pub const SITUATION_WARN_CHARS: usize = 90;

/// Counter turns to a warning at this many action characters
pub const ACTION_WARN_CHARS: usize = 220;

/// Unique record identifier, assigned at creation
pub type RecordId = u64;

/// Eisenhower-matrix classification of a situation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Criticality {
    /// Immediate crises and hard deadlines
    #[default]
    #[serde(rename = "Urgente e importante")]
    UrgentImportant,
    /// Interruptions, some calls and meetings
    #[serde(rename = "Urgente e não importante")]
    UrgentNotImportant,
    /// Planning, prevention, relationship building
    #[serde(rename = "Não urgente e importante")]
    NotUrgentImportant,
    /// Trivial activities and distractions
    #[serde(rename = "Não urgente e não importante")]
    NotUrgentNotImportant,
}

impl Criticality {
    pub const ALL: [Criticality; 4] = [
        Criticality::UrgentImportant,
        Criticality::UrgentNotImportant,
        Criticality::NotUrgentImportant,
        Criticality::NotUrgentNotImportant,
    ];

    /// Display label, also used verbatim in prompts and CSV export
    pub fn label(&self) -> &'static str {
        match self {
            Criticality::UrgentImportant => "Urgente e importante",
            Criticality::UrgentNotImportant => "Urgente e não importante",
            Criticality::NotUrgentImportant => "Não urgente e importante",
            Criticality::NotUrgentNotImportant => "Não urgente e não importante",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Criticality::UrgentImportant => "Crises imediatas e prazos fatais.",
            Criticality::UrgentNotImportant => "Interrupções, algumas chamadas e reuniões.",
            Criticality::NotUrgentImportant => {
                "Planejamento, prevenção e construção de relacionamentos."
            }
            Criticality::NotUrgentNotImportant => "Atividades triviais e distrações.",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Criticality::UrgentImportant => "🔴",
            Criticality::UrgentNotImportant => "🟠",
            Criticality::NotUrgentImportant => "🔵",
            Criticality::NotUrgentNotImportant => "⚪",
        }
    }

    /// Look up a category by its label (case-insensitive) or by its
    /// 1-based position in [`Criticality::ALL`]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(n) = input.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| Self::ALL.get(i).copied());
        }
        let lowered = input.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.label().to_lowercase() == lowered)
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A logged decision
///
/// Serializes with the Portuguese field names used in the analysis prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionRecord {
    pub id: RecordId,
    #[serde(rename = "data", with = "pt_br_date")]
    pub created_on: NaiveDate,
    #[serde(rename = "situacao")]
    pub situation: String,
    #[serde(rename = "criticidade")]
    pub criticality: Criticality,
    #[serde(rename = "acao")]
    pub action: String,
    #[serde(rename = "resultado")]
    pub result: String,
}

/// Date format shared by the table, the export and serialized records
const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

mod pt_br_date {
    use super::DISPLAY_DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DISPLAY_DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, DISPLAY_DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

impl DecisionRecord {
    /// Build a record from a draft that has already passed validation
    pub(crate) fn from_valid_draft(id: RecordId, created_on: NaiveDate, draft: RecordDraft) -> Self {
        Self {
            id,
            created_on,
            situation: draft.situation.trim().to_string(),
            criticality: draft.criticality,
            action: draft.action.trim().to_string(),
            result: draft.result.trim().to_string(),
        }
    }

    /// Creation date in the dd/mm/yyyy form used by the table and the export
    pub fn display_date(&self) -> String {
        self.created_on.format(DISPLAY_DATE_FORMAT).to_string()
    }
}

/// Field of a draft, used to point validation errors at the right input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Situation,
    Action,
    Result,
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DraftField::Situation => "situation",
            DraftField::Action => "action",
            DraftField::Result => "result",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(DraftField),

    #[error("{field} is too long: {len} characters, max {max}")]
    TooLong {
        field: DraftField,
        len: usize,
        max: usize,
    },
}

/// In-progress form contents; nothing here is guaranteed valid
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordDraft {
    pub situation: String,
    pub criticality: Criticality,
    pub action: String,
    pub result: String,
}

impl RecordDraft {
    pub fn new(
        situation: impl Into<String>,
        criticality: Criticality,
        action: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            situation: situation.into(),
            criticality,
            action: action.into(),
            result: result.into(),
        }
    }

    /// Check required fields and length bounds
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_field(&self.situation, DraftField::Situation, Some(SITUATION_MAX_CHARS))?;
        check_field(&self.action, DraftField::Action, Some(ACTION_MAX_CHARS))?;
        check_field(&self.result, DraftField::Result, None)?;
        Ok(())
    }

    /// `n/100` counter for the situation input, with its warning flag
    pub fn situation_counter(&self) -> (String, bool) {
        counter(&self.situation, SITUATION_MAX_CHARS, SITUATION_WARN_CHARS)
    }

    /// `n/240` counter for the action input, with its warning flag
    pub fn action_counter(&self) -> (String, bool) {
        counter(&self.action, ACTION_MAX_CHARS, ACTION_WARN_CHARS)
    }

    pub fn has_situation(&self) -> bool {
        !self.situation.trim().is_empty()
    }
}

fn check_field(value: &str, field: DraftField, max: Option<usize>) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if let Some(max) = max {
        let len = trimmed.chars().count();
        if len > max {
            return Err(ValidationError::TooLong { field, len, max });
        }
    }
    Ok(())
}

fn counter(value: &str, max: usize, warn_at: usize) -> (String, bool) {
    let len = value.chars().count();
    (format!("{}/{}", len, max), len >= warn_at)
}

/// Truncate to at most `max` characters, never splitting a code point
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
