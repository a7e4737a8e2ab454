//! History Store - Append-only, deduplicating log of every ingested ticket
//!
//! Single writer: merges on one store must be serialized, which
//! [`CsvHistoryStore`] enforces with a lock file around read-modify-write.

pub mod csv_store;
pub mod history;
pub mod lock;

pub use csv_store::CsvHistoryStore;
pub use history::{merge_history, DuplicatePolicy, History, MergeOutcome};
pub use lock::StoreLease;

use crate::error::Result;
use crate::record::CaseRecord;
use serde::{Deserialize, Serialize};

/// Counts reported back after a merge
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Post-dedup size minus pre-merge size
    pub new_record_count: usize,
    pub total_history_count: usize,
    pub duplicates_dropped: usize,
    pub missing_case_id: usize,
}

/// Load/merge contract of the durable ticket log.
pub trait HistoryStore {
    /// Full history; a store that doesn't exist yet is empty, not an error.
    fn load(&self) -> Result<History>;

    /// Fold `incoming` into history, keeping one record per `case_id`.
    fn merge(&self, incoming: Vec<CaseRecord>) -> Result<MergeReport>;
}
