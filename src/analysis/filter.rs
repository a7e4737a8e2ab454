//! Record Filter - Selects the subset of history a report or export covers

use crate::record::{fields, CaseRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All set criteria must match. Text comparisons ignore case and
/// surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub zone: Option<String>,
    pub area_group: Option<String>,
    pub block: Option<String>,
    pub status: Option<String>,
    /// Only records from snapshots taken at or after this instant
    pub since: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.zone.is_none()
            && self.area_group.is_none()
            && self.block.is_none()
            && self.status.is_none()
            && self.since.is_none()
    }

    pub fn matches(&self, record: &CaseRecord) -> bool {
        let text_ok = [
            (fields::ZONE, &self.zone),
            (fields::AREA_GROUP, &self.area_group),
            (fields::BLOCK, &self.block),
            (fields::STATUS, &self.status),
        ]
        .iter()
        .all(|(field, wanted)| match wanted {
            Some(wanted) => record
                .get(field)
                .map(|v| v.trim().eq_ignore_ascii_case(wanted.trim()))
                .unwrap_or(false),
            None => true,
        });

        let since_ok = match self.since {
            Some(since) => record
                .get(fields::SNAPSHOT_TIME)
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&Utc) >= since)
                .unwrap_or(false),
            None => true,
        };

        text_ok && since_ok
    }

    pub fn apply<'a>(&self, records: &'a [CaseRecord]) -> Vec<&'a CaseRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Owned copy of the matching records.
    pub fn select(&self, records: &[CaseRecord]) -> Vec<CaseRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(zone: &str, status: &str, snapshot: &str) -> CaseRecord {
        CaseRecord::new()
            .with(fields::CASE_ID, "C")
            .with(fields::ZONE, zone)
            .with(fields::STATUS, status)
            .with(fields::SNAPSHOT_TIME, snapshot)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let f = RecordFilter::default();
        assert!(f.is_empty());
        assert!(f.matches(&CaseRecord::new()));
    }

    #[test]
    fn test_text_criteria_ignore_case() {
        let f = RecordFilter {
            zone: Some("phx-25".into()),
            status: Some(" OPEN".into()),
            ..Default::default()
        };
        assert!(f.matches(&record("PHX-25", "Open", "2026-10-01T00:00:00Z")));
        assert!(!f.matches(&record("PHX-25", "Closed", "2026-10-01T00:00:00Z")));
        assert!(!f.matches(&CaseRecord::new().with(fields::STATUS, "Open")));
    }

    #[test]
    fn test_since_uses_snapshot_time() {
        let f = RecordFilter {
            since: Some(Utc.with_ymd_and_hms(2026, 10, 5, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        let records = vec![
            record("PHX-25", "Open", "2026-10-01T00:00:00Z"),
            record("PHX-25", "Open", "2026-10-06T12:00:00+00:00"),
            record("PHX-25", "Open", "not a time"),
        ];
        assert_eq!(f.apply(&records).len(), 1);
    }
}
