//! In-memory record store
//!
//! Holds the session's decision records, newest first. There is no
//! persistence: the store lives as long as the session that owns it and is
//! exported to CSV on demand.

use crate::types::{DecisionRecord, RecordDraft, RecordId, ValidationError};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

/// Header row of the CSV export
pub const EXPORT_HEADER: &str = "Data,Situação,Criticidade,Ação Tomada,Resultado";

/// Ordered collection of decision records (most recent first)
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<DecisionRecord>,
    last_id: RecordId,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a draft, stamp it with an id and today's date, and append it
    pub fn create(&mut self, draft: RecordDraft) -> Result<&DecisionRecord, ValidationError> {
        self.create_at(draft, Local::now())
    }

    /// Same as [`RecordStore::create`] with an explicit clock reading
    pub fn create_at<Tz: TimeZone>(
        &mut self,
        draft: RecordDraft,
        now: DateTime<Tz>,
    ) -> Result<&DecisionRecord, ValidationError> {
        draft.validate()?;

        let id = self.next_id(now.timestamp_millis());
        let record = DecisionRecord::from_valid_draft(id, now.date_naive(), draft);
        tracing::debug!(id, criticality = %record.criticality, "Record created");

        self.append(record);
        Ok(&self.records[0])
    }

    /// Creation timestamp in milliseconds, bumped past the previous id so ids
    /// stay strictly increasing even for two records in the same millisecond
    fn next_id(&mut self, millis: i64) -> RecordId {
        let candidate = u64::try_from(millis).unwrap_or(0);
        let id = candidate.max(self.last_id.saturating_add(1));
        self.last_id = id;
        id
    }

    /// Insert at the head of the sequence
    pub fn append(&mut self, record: DecisionRecord) {
        self.last_id = self.last_id.max(record.id);
        self.records.insert(0, record);
    }

    /// Delete the record with `id`. Returns whether anything was removed;
    /// an unknown id is not an error.
    pub fn remove(&mut self, id: RecordId) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let removed = self.records.len() != before;
        if removed {
            tracing::debug!(id, "Record removed");
        }
        removed
    }

    /// All records, newest first
    pub fn all(&self) -> &[DecisionRecord] {
        &self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&DecisionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render every record as CSV, header row first
    pub fn export_delimited(&self) -> String {
        let mut lines = Vec::with_capacity(self.records.len() + 1);
        lines.push(EXPORT_HEADER.to_string());

        for record in &self.records {
            let row = [
                record.display_date(),
                quote(&record.situation),
                quote(record.criticality.label()),
                quote(&record.action),
                quote(&record.result),
            ];
            lines.push(row.join(","));
        }

        lines.join("\n")
    }

    /// Write the CSV export into `dir` and return the file path
    pub fn write_export(&self, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {:?}", dir))?;

        let path = dir.join(export_file_name(date));
        fs::write(&path, self.export_delimited())
            .with_context(|| format!("Failed to write export to {:?}", path))?;

        tracing::info!(records = self.records.len(), path = %path.display(), "CSV exported");
        Ok(path)
    }
}

/// `registro_decisoes_<YYYY-MM-DD>.csv`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("registro_decisoes_{}.csv", date.format("%Y-%m-%d"))
}

/// Wrap a free-text field in double quotes, doubling any embedded quote
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Criticality;
    use tempfile::tempdir;

    fn draft(situation: &str) -> RecordDraft {
        RecordDraft::new(situation, Criticality::UrgentImportant, "Ação", "Resultado")
    }

    fn fixed_now() -> DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    /// Split a CSV row on commas that are outside quotes
    fn split_csv_row(row: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        for c in row.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        fields.push(current);
        fields
    }

    #[test]
    fn test_newest_first() {
        let mut store = RecordStore::new();
        store.create_at(draft("A"), fixed_now()).unwrap();
        store.create_at(draft("B"), fixed_now()).unwrap();

        let situations: Vec<&str> = store.all().iter().map(|r| r.situation.as_str()).collect();
        assert_eq!(situations, vec!["B", "A"]);
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let mut store = RecordStore::new();
        let a = store.create_at(draft("A"), fixed_now()).unwrap().id;
        let b = store.create_at(draft("B"), fixed_now()).unwrap().id;
        assert!(b > a);
        assert_eq!(a as i64, fixed_now().timestamp_millis());
    }

    #[test]
    fn test_create_after_max_id_does_not_overflow() {
        let mut store = RecordStore::new();
        store.append(DecisionRecord::from_valid_draft(
            u64::MAX,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            draft("Importado"),
        ));

        let id = store.create_at(draft("A"), fixed_now()).unwrap().id;
        assert_eq!(id, u64::MAX);
        assert_eq!(store.len(), 2);
        assert_eq!(store.all()[0].situation, "A");
    }

    #[test]
    fn test_create_rejects_invalid_draft() {
        let mut store = RecordStore::new();
        assert!(store.create_at(draft(""), fixed_now()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_create_stamps_date() {
        let mut store = RecordStore::new();
        let record = store.create_at(draft("A"), fixed_now()).unwrap();
        assert_eq!(record.created_on, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
    }

    #[test]
    fn test_append_then_remove_restores_store() {
        let mut store = RecordStore::new();
        store.create_at(draft("A"), fixed_now()).unwrap();
        let before = store.all().to_vec();

        let id = store.create_at(draft("B"), fixed_now()).unwrap().id;
        assert!(store.remove(id));

        assert_eq!(store.all(), before.as_slice());
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut store = RecordStore::new();
        store.create_at(draft("A"), fixed_now()).unwrap();
        let before = store.all().to_vec();

        assert!(!store.remove(42));
        assert_eq!(store.all(), before.as_slice());
    }

    #[test]
    fn test_get() {
        let mut store = RecordStore::new();
        let id = store.create_at(draft("A"), fixed_now()).unwrap().id;
        assert_eq!(store.get(id).map(|r| r.situation.as_str()), Some("A"));
        assert!(store.get(id + 1).is_none());
    }

    #[test]
    fn test_export_empty_is_header_only() {
        let store = RecordStore::new();
        assert_eq!(store.export_delimited(), EXPORT_HEADER);
    }

    #[test]
    fn test_export_row_format() {
        let mut store = RecordStore::new();
        store
            .create_at(
                RecordDraft::new("Queda", Criticality::NotUrgentImportant, "Plano", "Ok"),
                fixed_now(),
            )
            .unwrap();

        let csv = store.export_delimited();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[1],
            "01/06/2025,\"Queda\",\"Não urgente e importante\",\"Plano\",\"Ok\""
        );
    }

    #[test]
    fn test_export_keeps_embedded_comma_in_field() {
        let mut store = RecordStore::new();
        store.create_at(draft("Deploy, rollback"), fixed_now()).unwrap();

        let csv = store.export_delimited();
        let row = csv.lines().nth(1).unwrap();
        let fields = split_csv_row(row);

        assert_eq!(fields.len(), 5);
        assert_eq!(fields[1], "Deploy, rollback");
    }

    #[test]
    fn test_export_escapes_quotes() {
        let mut store = RecordStore::new();
        store.create_at(draft("Cliente disse \"urgente\""), fixed_now()).unwrap();

        let csv = store.export_delimited();
        assert!(csv.contains("\"Cliente disse \"\"urgente\"\"\""));
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
        assert_eq!(export_file_name(date), "registro_decisoes_2025-01-09.csv");
    }

    #[test]
    fn test_write_export() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::new();
        store.create_at(draft("Situação com acento"), fixed_now()).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let path = store.write_export(dir.path(), date).unwrap();

        assert_eq!(path, dir.path().join("registro_decisoes_2025-06-01.csv"));
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, store.export_delimited());
        assert!(written.starts_with(EXPORT_HEADER));
    }
}
