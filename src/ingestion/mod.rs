//! Ingestion Module - Raw export to deduplicated history
//!
//! Handles one uploaded ticket export end to end:
//! - Decoding (csv / xlsx bytes)
//! - Header row location below vendor banners
//! - Column discovery
//! - Junk and total row cleaning
//! - Location decomposition
//! - Merge into the history store

pub mod cleaner;
pub mod column_map;
pub mod decomposer;
pub mod header_locator;
pub mod pipeline;
pub mod raw_sheet;

pub use cleaner::{CleaningStats, RecordCleaner, Table};
pub use column_map::ColumnMap;
pub use decomposer::{
    decompose_identifier, extract_street, Decomposer, DecompositionStats, LocationParts,
};
pub use header_locator::HeaderLocator;
pub use pipeline::Ingestor;
pub use raw_sheet::{CellValue, InputFormat, RawSheet};

use crate::record::CaseRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ingestion result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Ingestion run ID
    pub run_id: String,

    /// RFC 3339 timestamp stamped on every record of this upload
    pub snapshot_time: String,

    /// Tickets that were not in history before this upload
    pub new_record_count: usize,

    pub total_history_count: usize,

    /// Leading cleaned records, for display
    pub cleaned_preview: Vec<CaseRecord>,

    /// Zero-based row index of the located header
    pub header_row: usize,

    pub cleaning: CleaningStats,

    pub decomposition: DecompositionStats,

    pub warnings: Vec<IngestionWarning>,
}

/// Non-fatal conditions found while ingesting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionWarning {
    /// Nothing survived cleaning; history was left untouched
    AllRowsFiltered,
    /// No column resolved to a ticket identifier
    MissingCaseIdColumn,
    /// Records dropped at merge because they had no ticket identifier
    RecordsWithoutCaseId(usize),
}

impl fmt::Display for IngestionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionWarning::AllRowsFiltered => {
                write!(f, "all rows were filtered out; history unchanged")
            }
            IngestionWarning::MissingCaseIdColumn => write!(f, "no ticket identifier column found"),
            IngestionWarning::RecordsWithoutCaseId(n) => {
                write!(f, "{} records had no ticket identifier and were not merged", n)
            }
        }
    }
}
