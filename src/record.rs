//! Case Record - One ticket row, keyed by column name

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical field names shared by ingestion, the history file and analysis.
pub mod fields {
    pub const CASE_ID: &str = "case_id";
    pub const BLOCK_IDENTIFIER: &str = "block_identifier";
    pub const ZONE: &str = "zone";
    pub const AREA_GROUP: &str = "area_group";
    pub const BLOCK: &str = "block";
    pub const STREET: &str = "street";
    pub const STATUS: &str = "status";
    pub const OPENED_AT: &str = "opened_at";
    pub const DAYS_OPEN: &str = "days_open";
    pub const ADDRESS: &str = "address";
    pub const SNAPSHOT_TIME: &str = "snapshot_time";

    /// Derived location fields; always set or cleared together.
    pub const LOCATION: [&str; 3] = [ZONE, AREA_GROUP, BLOCK];

    /// Column order of canonical fields in the history file.
    pub const ORDER: [&str; 11] = [
        CASE_ID,
        BLOCK_IDENTIFIER,
        ZONE,
        AREA_GROUP,
        BLOCK,
        STREET,
        STATUS,
        OPENED_AT,
        DAYS_OPEN,
        ADDRESS,
        SNAPSHOT_TIME,
    ];

    /// Sort key placing canonical fields first; others keep a stable tail.
    pub fn rank(name: &str) -> usize {
        ORDER.iter().position(|f| *f == name).unwrap_or(ORDER.len())
    }
}

/// A single ticket. Empty values are never stored, so a missing key and an
/// empty cell read the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    values: BTreeMap<String, String>,
}

impl CaseRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|v| v.as_str())
    }

    /// Sets a field. Blank values remove the field instead.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        if value.trim().is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.values.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn case_id(&self) -> Option<&str> {
        self.get(fields::CASE_ID).map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn has_location(&self) -> bool {
        fields::LOCATION.iter().all(|f| self.contains(f))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl AsRef<CaseRecord> for CaseRecord {
    fn as_ref(&self) -> &CaseRecord {
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CaseRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = CaseRecord::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_absent() {
        let record = CaseRecord::new().with("status", "   ").with(fields::CASE_ID, "C-1");
        assert!(!record.contains("status"));
        assert_eq!(record.case_id(), Some("C-1"));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_has_location_requires_all_three() {
        let partial = CaseRecord::new()
            .with(fields::ZONE, "PHX-25")
            .with(fields::AREA_GROUP, "AG1");
        assert!(!partial.has_location());
        assert!(partial.with(fields::BLOCK, "B012").has_location());
    }
}
