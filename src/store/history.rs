//! History - In-memory view of the ticket log and the dedup merge rule

use crate::record::{fields, CaseRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which record survives when two share a `case_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Existing history wins over re-uploads
    #[default]
    KeepFirst,
    /// The latest upload replaces the stored record in place
    KeepLast,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "keep_first" | "first" => Ok(DuplicatePolicy::KeepFirst),
            "keep_last" | "last" => Ok(DuplicatePolicy::KeepLast),
            other => Err(format!("unknown duplicate policy '{}'", other)),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::KeepFirst => write!(f, "keep_first"),
            DuplicatePolicy::KeepLast => write!(f, "keep_last"),
        }
    }
}

/// All stored records plus the column order of the history file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    columns: Vec<String>,
    records: Vec<CaseRecord>,
}

impl History {
    pub fn new(columns: Vec<String>, records: Vec<CaseRecord>) -> Self {
        let mut history = Self { columns, records: Vec::new() };
        for record in records {
            history.push(record);
        }
        history
    }

    pub fn from_records(records: Vec<CaseRecord>) -> Self {
        Self::new(Vec::new(), records)
    }

    /// Column union in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[CaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, case_id: &str) -> Option<&CaseRecord> {
        self.records.iter().find(|r| r.case_id() == Some(case_id))
    }

    fn push(&mut self, record: CaseRecord) {
        self.extend_columns(&record);
        self.records.push(record);
    }

    /// Add unseen field names, canonical fields first in their fixed order.
    fn extend_columns(&mut self, record: &CaseRecord) {
        let mut unseen: Vec<&str> = record
            .field_names()
            .filter(|name| !self.columns.iter().any(|c| c == name))
            .collect();
        unseen.sort_by_key(|name| fields::rank(name));
        self.columns.extend(unseen.into_iter().map(str::to_string));
    }
}

/// Result of folding a batch into history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub history: History,
    pub new_record_count: usize,
    pub duplicates_dropped: usize,
    pub missing_case_id: usize,
    /// Whether the stored history differs from before the merge
    pub changed: bool,
}

/// Concatenate `existing` and `incoming`, then keep one record per `case_id`.
/// Records without an id can't be keyed and are dropped.
pub fn merge_history(
    existing: History,
    incoming: Vec<CaseRecord>,
    policy: DuplicatePolicy,
) -> MergeOutcome {
    let before = existing.len();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(before + incoming.len());
    let mut merged = History {
        columns: existing.columns.clone(),
        records: Vec::with_capacity(before + incoming.len()),
    };
    let mut duplicates_dropped = 0;
    let mut missing_case_id = 0;
    let mut replaced = false;

    let existing_len = existing.records.len();
    for (pos, record) in existing.records.into_iter().chain(incoming).enumerate() {
        let from_upload = pos >= existing_len;
        let Some(id) = record.case_id().map(str::to_string) else {
            missing_case_id += 1;
            continue;
        };
        match index.get(&id) {
            Some(&slot) => {
                duplicates_dropped += 1;
                if policy == DuplicatePolicy::KeepLast && merged.records[slot] != record {
                    merged.extend_columns(&record);
                    merged.records[slot] = record;
                    replaced |= from_upload;
                }
            }
            None => {
                index.insert(id, merged.records.len());
                merged.push(record);
            }
        }
    }

    let new_record_count = merged.len().saturating_sub(before);
    MergeOutcome {
        changed: new_record_count > 0 || replaced || merged.len() != before,
        history: merged,
        new_record_count,
        duplicates_dropped,
        missing_case_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str, status: &str) -> CaseRecord {
        CaseRecord::new().with(fields::CASE_ID, id).with(fields::STATUS, status)
    }

    #[test]
    fn test_keep_first_prefers_history() {
        let existing = History::from_records(vec![case("A", "Open")]);
        let outcome = merge_history(
            existing,
            vec![case("A", "Closed"), case("B", "Open")],
            DuplicatePolicy::KeepFirst,
        );
        assert_eq!(outcome.new_record_count, 1);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.history.get("A").unwrap().get(fields::STATUS), Some("Open"));
        assert!(outcome.changed);
    }

    #[test]
    fn test_keep_last_replaces_in_place() {
        let existing = History::from_records(vec![case("A", "Open"), case("B", "Open")]);
        let outcome = merge_history(existing, vec![case("A", "Closed")], DuplicatePolicy::KeepLast);
        assert_eq!(outcome.new_record_count, 0);
        assert_eq!(outcome.history.records()[0].get(fields::STATUS), Some("Closed"));
        assert!(outcome.changed);
    }

    #[test]
    fn test_remerge_is_noop() {
        let batch = vec![case("A", "Open"), case("B", "Open")];
        let first = merge_history(History::default(), batch.clone(), DuplicatePolicy::KeepFirst);
        assert_eq!(first.new_record_count, 2);

        let second = merge_history(first.history.clone(), batch, DuplicatePolicy::KeepFirst);
        assert_eq!(second.new_record_count, 0);
        assert_eq!(second.history, first.history);
        assert!(!second.changed);
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let outcome = merge_history(
            History::default(),
            vec![
                case("A", "Open"),
                case("A", "Closed"),
                CaseRecord::new().with(fields::STATUS, "Open"),
            ],
            DuplicatePolicy::KeepFirst,
        );
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.missing_case_id, 1);
    }

    #[test]
    fn test_column_union_in_first_seen_order() {
        let existing = History::from_records(vec![case("A", "Open")]);
        let outcome = merge_history(
            existing,
            vec![case("B", "Open").with("Owner", "ops")],
            DuplicatePolicy::KeepFirst,
        );
        assert_eq!(outcome.history.columns(), &["case_id", "status", "Owner"]);
    }

    #[test]
    fn test_canonical_columns_lead() {
        let record = CaseRecord::new()
            .with("Owner", "ops")
            .with(fields::SNAPSHOT_TIME, "2026-10-19T00:00:00Z")
            .with(fields::ZONE, "PHX-25")
            .with(fields::CASE_ID, "A");
        let history = History::from_records(vec![record]);
        assert_eq!(history.columns(), &["case_id", "zone", "snapshot_time", "Owner"]);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("keep-last".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::KeepLast);
        assert_eq!("KEEP_FIRST".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::KeepFirst);
        assert!("newest".parse::<DuplicatePolicy>().is_err());
    }
}
