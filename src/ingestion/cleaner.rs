//! Record Cleaner - Drops blank, banner, repeated-header and total rows

use crate::ingestion::column_map::ColumnMap;
use crate::ingestion::raw_sheet::RawSheet;
use crate::record::{fields, CaseRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Phrases that mark vendor banner rows, wherever they appear in the export.
pub const DEFAULT_JUNK_PHRASES: &[&str] = &[
    "filtered by",
    "units:",
    "applied filters",
    "report generated",
    "generated on",
    "confidential - internal",
    "export criteria",
];

const TOTAL_MARKERS: &[&str] = &["total", "sum"];

/// The sheet reinterpreted with the located header row as column names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Header row at `header_row`, data rows below it. Rows and headers are
    /// padded to a common width.
    pub fn from_sheet(sheet: &RawSheet, header_row: usize) -> Self {
        let rows = sheet.rows();
        let Some(header_cells) = rows.get(header_row) else {
            return Self::default();
        };

        let body = &rows[header_row + 1..];
        let width = body
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0);

        let mut headers: Vec<String> = header_cells.iter().map(|c| c.as_text()).collect();
        headers.resize(width, String::new());

        let rows = body
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = row.iter().map(|c| c.as_text()).collect();
                cells.resize(width, String::new());
                cells
            })
            .collect();

        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Convert rows into records named by `columns`, stamped with the snapshot.
    pub fn into_records(self, columns: &ColumnMap, snapshot_time: &str) -> Vec<CaseRecord> {
        self.rows
            .into_iter()
            .map(|row| {
                let mut record: CaseRecord = row
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idx, value)| {
                        columns.name(idx).map(|name| (name.to_string(), value))
                    })
                    .collect();
                record.set(fields::SNAPSHOT_TIME, snapshot_time);
                record
            })
            .collect()
    }
}

/// Rows removed per rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub blank_rows: usize,
    pub junk_rows: usize,
    pub repeated_headers: usize,
    pub total_or_missing_id: usize,
    pub kept_rows: usize,
}

impl CleaningStats {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.kept_rows
    }
}

#[derive(Debug, Clone)]
pub struct RecordCleaner {
    junk_phrases: Vec<String>,
}

impl Default for RecordCleaner {
    fn default() -> Self {
        Self::with_junk_phrases(DEFAULT_JUNK_PHRASES.iter().copied())
    }
}

impl RecordCleaner {
    pub fn with_junk_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            junk_phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    /// Filter the table. Surviving rows keep their relative order.
    pub fn clean(&self, table: Table, columns: &ColumnMap) -> (Table, CleaningStats) {
        let mut stats = CleaningStats {
            input_rows: table.rows.len(),
            ..Default::default()
        };
        let id_col = columns.index_of(fields::CASE_ID);
        let header_key: Vec<String> =
            table.headers.iter().map(|h| h.trim().to_lowercase()).collect();

        let Table { headers, rows } = table;
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .filter(|row| {
                if row.iter().all(|c| c.trim().is_empty()) {
                    stats.blank_rows += 1;
                    return false;
                }
                if self.is_junk(row) {
                    stats.junk_rows += 1;
                    return false;
                }
                if row.iter().map(|c| c.trim().to_lowercase()).eq(header_key.iter().cloned()) {
                    stats.repeated_headers += 1;
                    return false;
                }
                if let Some(idx) = id_col {
                    if is_total_or_blank_id(row.get(idx).map(|s| s.as_str()).unwrap_or("")) {
                        stats.total_or_missing_id += 1;
                        return false;
                    }
                }
                true
            })
            .collect();

        stats.kept_rows = rows.len();
        info!(
            "Cleaned {} rows: kept {}, blank {}, banner {}, repeated header {}, total/blank id {}",
            stats.input_rows,
            stats.kept_rows,
            stats.blank_rows,
            stats.junk_rows,
            stats.repeated_headers,
            stats.total_or_missing_id
        );

        (Table { headers, rows }, stats)
    }

    fn is_junk(&self, row: &[String]) -> bool {
        let joined = row.join(" ").to_lowercase();
        self.junk_phrases.iter().any(|p| joined.contains(p.as_str()))
    }
}

fn is_total_or_blank_id(id: &str) -> bool {
    let id = id.trim().to_lowercase();
    id.is_empty() || TOTAL_MARKERS.iter().any(|m| id.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn export_table() -> Table {
        table(
            &["Case Number", "Block ID", "Status"],
            &[
                &["C-1", "VR-PHX-25-AG1-B012", "Open"],
                &["", "", ""],
                &["Filtered By: Region = PHX", "", ""],
                &["Case Number", "Block ID", "Status"],
                &["C-2", "VR-PHX-25-AG1-B013", "Closed"],
                &["Total: 2 cases", "", ""],
                &["   ", "VR-PHX-25-AG2-B001", "Open"],
                &["Units: days", "", ""],
            ],
        )
    }

    #[test]
    fn test_clean_drops_each_kind_of_noise() {
        let t = export_table();
        let map = ColumnMap::resolve(&t.headers);
        let (cleaned, stats) = RecordCleaner::default().clean(t, &map);

        let ids: Vec<&str> = cleaned.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(ids, vec!["C-1", "C-2"]);
        assert_eq!(stats.blank_rows, 1);
        assert_eq!(stats.junk_rows, 2);
        assert_eq!(stats.repeated_headers, 1);
        assert_eq!(stats.total_or_missing_id, 2);
        assert_eq!(stats.dropped(), 6);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let t = export_table();
        let map = ColumnMap::resolve(&t.headers);
        let cleaner = RecordCleaner::default();
        let (once, _) = cleaner.clean(t, &map);
        let (twice, stats) = cleaner.clean(once.clone(), &map);
        assert_eq!(once, twice);
        assert_eq!(stats.dropped(), 0);
    }

    #[test]
    fn test_sum_rows_dropped_case_insensitively() {
        let t = table(&["Ticket", "Status"], &[&["SUM", "4"], &["T-9", "Open"]]);
        let map = ColumnMap::resolve(&t.headers);
        let (cleaned, _) = RecordCleaner::default().clean(t, &map);
        assert_eq!(cleaned.rows, vec![vec!["T-9".to_string(), "Open".to_string()]]);
    }

    #[test]
    fn test_without_id_column_only_blank_and_junk_rules_apply() {
        let t = table(&["Status", "Address"], &[&["Open", ""], &["Total", "x"], &["", ""]]);
        let map = ColumnMap::resolve(&t.headers);
        let (cleaned, stats) = RecordCleaner::default().clean(t, &map);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(stats.blank_rows, 1);
    }

    #[test]
    fn test_into_records_renames_resolved_columns() {
        let t = table(&["Case Number", "Owner"], &[&["C-7", "night shift"]]);
        let map = ColumnMap::resolve(&t.headers);
        let records = t.into_records(&map, "2026-10-19T08:00:00Z");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].case_id(), Some("C-7"));
        assert_eq!(records[0].get("Owner"), Some("night shift"));
        assert_eq!(records[0].get(fields::SNAPSHOT_TIME), Some("2026-10-19T08:00:00Z"));
    }

    #[test]
    fn test_table_from_sheet_pads_ragged_rows() {
        let sheet = RawSheet::from_text_rows(vec![
            vec!["banner"],
            vec!["Case Number", "Status"],
            vec!["C-1", "Open", "extra"],
            vec!["C-2"],
        ]);
        let t = Table::from_sheet(&sheet, 1);
        assert_eq!(t.headers, vec!["Case Number", "Status", ""]);
        assert_eq!(t.rows[1], vec!["C-2", "", ""]);
    }
}
