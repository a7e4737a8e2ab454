//! Header Locator - Finds the real column-header row under vendor banner rows

use crate::error::{LedgerError, Result};
use crate::ingestion::raw_sheet::{CellValue, RawSheet};
use tracing::{debug, info};

/// Labels that only show up in the real header of a ticket export.
pub const DEFAULT_HEADER_MARKERS: &[&str] = &[
    "case number",
    "case id",
    "case_id",
    "ticket",
    "block id",
    "block_identifier",
    "premises id",
    "status",
    "days open",
    "days_open",
    "aging",
    "address",
];

#[derive(Debug, Clone)]
pub struct HeaderLocator {
    markers: Vec<String>,
    min_matches: usize,
}

impl Default for HeaderLocator {
    fn default() -> Self {
        Self::new(2)
    }
}

impl HeaderLocator {
    /// `min_matches` is clamped to 2 so one banner cell can't qualify.
    pub fn new(min_matches: usize) -> Self {
        Self {
            markers: DEFAULT_HEADER_MARKERS.iter().map(|m| m.to_string()).collect(),
            min_matches: min_matches.max(2),
        }
    }

    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Number of cells in `row` mentioning at least one marker.
    pub fn score(&self, row: &[CellValue]) -> usize {
        row.iter()
            .filter(|cell| {
                let text = cell.as_text().to_lowercase();
                !text.is_empty() && self.markers.iter().any(|m| text.contains(m.as_str()))
            })
            .count()
    }

    /// Zero-based index of the first row meeting the threshold.
    pub fn locate(&self, sheet: &RawSheet) -> Result<usize> {
        for (idx, row) in sheet.rows().iter().enumerate() {
            let score = self.score(row);
            if score >= self.min_matches {
                info!("Header row found at index {} ({} marker cells)", idx, score);
                return Ok(idx);
            }
            if score > 0 {
                debug!("Row {} mentions {} marker(s), below threshold", idx, score);
            }
        }
        Err(LedgerError::HeaderNotFound {
            rows_scanned: sheet.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> RawSheet {
        RawSheet::from_text_rows(rows.iter().map(|r| r.iter().map(|c| c.to_string())))
    }

    #[test]
    fn test_skips_banner_rows() {
        let sheet = sheet(&[
            &["Network Operations Export"],
            &["Filtered By: Status = Open"],
            &[""],
            &["Case Number", "Block ID", "Status", "Days Open"],
            &["C-1", "VR-PHX-25-AG1-B012", "Open", "3"],
        ]);
        assert_eq!(HeaderLocator::default().locate(&sheet).unwrap(), 3);
    }

    #[test]
    fn test_first_qualifying_row_wins() {
        let sheet = sheet(&[
            &["Ticket", "Status"],
            &["Case Number", "Block ID", "Status", "Days Open"],
        ]);
        assert_eq!(HeaderLocator::default().locate(&sheet).unwrap(), 0);
    }

    #[test]
    fn test_single_marker_banner_is_not_header() {
        let sheet = sheet(&[&["Status report", "generated nightly"], &["x", "y"]]);
        let err = HeaderLocator::default().locate(&sheet).unwrap_err();
        assert!(matches!(err, LedgerError::HeaderNotFound { rows_scanned: 2 }));
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        let locator = HeaderLocator::default();
        let row = vec![
            CellValue::Text("CASE NUMBER (primary)".into()),
            CellValue::Text("Current Status".into()),
            CellValue::Int(7),
        ];
        assert_eq!(locator.score(&row), 2);
    }

    #[test]
    fn test_threshold_never_below_two() {
        let locator = HeaderLocator::new(0);
        let sheet = sheet(&[&["Status"], &["Case Number", "Status"]]);
        assert_eq!(locator.locate(&sheet).unwrap(), 1);
    }

    #[test]
    fn test_custom_markers() {
        let locator = HeaderLocator::default().with_markers(["incident", "site code"]);
        let sheet = sheet(&[&["Case Number", "Status"], &["Incident #", "Site Code"]]);
        assert_eq!(locator.locate(&sheet).unwrap(), 1);
    }
}
