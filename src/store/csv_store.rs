//! CSV History Store - Durable flat-file ticket log
//!
//! One row per ticket, header row = union of every field seen so far.
//! Writes go to a sibling temp file and are renamed over the store, so a
//! failed merge leaves the previous history untouched.

use crate::error::{LedgerError, Result};
use crate::record::CaseRecord;
use crate::store::history::{merge_history, DuplicatePolicy, History};
use crate::store::lock::StoreLease;
use crate::store::{HistoryStore, MergeReport};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CsvHistoryStore {
    path: PathBuf,
    policy: DuplicatePolicy,
    lock_timeout: Duration,
}

impl CsvHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            policy: DuplicatePolicy::default(),
            lock_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn read_history(&self) -> Result<History> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history at {}, starting empty", self.path.display());
                return Ok(History::default());
            }
            Err(e) => return Err(LedgerError::store(&self.path, e)),
        };

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let columns: Vec<String> = rdr
            .headers()
            .map_err(|e| LedgerError::store(&self.path, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut records = Vec::new();
        for row in rdr.records() {
            let row = row.map_err(|e| LedgerError::store(&self.path, e))?;
            let record: CaseRecord = columns
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect();
            records.push(record);
        }
        Ok(History::new(columns, records))
    }

    /// Replace the store file with `history`, all or nothing.
    fn write_history(&self, history: &History) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LedgerError::store(&self.path, e))?;
            }
        }

        let tmp = sibling(&self.path, &format!("tmp.{}", std::process::id()));
        let written = write_csv(&tmp, history).and_then(|_| {
            fs::rename(&tmp, &self.path).map_err(|e| LedgerError::store(&self.path, e))
        });
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }
}

impl HistoryStore for CsvHistoryStore {
    fn load(&self) -> Result<History> {
        let history = self.read_history()?;
        debug!("Loaded {} records from {}", history.len(), self.path.display());
        Ok(history)
    }

    fn merge(&self, incoming: Vec<CaseRecord>) -> Result<MergeReport> {
        let _lease = StoreLease::acquire(&self.lock_path(), self.lock_timeout)?;

        let existing = self.read_history()?;
        let before = existing.len();
        let outcome = merge_history(existing, incoming, self.policy);

        if outcome.changed {
            self.write_history(&outcome.history)?;
        }
        info!(
            "Merged into {} ({}): {} new, {} duplicates, {} without case id, {} -> {} records",
            self.path.display(),
            self.policy(),
            outcome.new_record_count,
            outcome.duplicates_dropped,
            outcome.missing_case_id,
            before,
            outcome.history.len()
        );

        Ok(MergeReport {
            new_record_count: outcome.new_record_count,
            total_history_count: outcome.history.len(),
            duplicates_dropped: outcome.duplicates_dropped,
            missing_case_id: outcome.missing_case_id,
        })
    }
}

fn write_csv(path: &Path, history: &History) -> Result<()> {
    let file = File::create(path).map_err(|e| LedgerError::store(path, e))?;
    let mut buf = BufWriter::new(file);
    {
        let mut wtr = WriterBuilder::new().from_writer(&mut buf);
        wtr.write_record(history.columns())
            .map_err(|e| LedgerError::store(path, e))?;
        for record in history.records() {
            let row = history.columns().iter().map(|c| record.get(c).unwrap_or(""));
            wtr.write_record(row).map_err(|e| LedgerError::store(path, e))?;
        }
        wtr.flush().map_err(|e| LedgerError::store(path, e))?;
    }
    buf.flush().map_err(|e| LedgerError::store(path, e))?;
    buf.get_ref().sync_all().map_err(|e| LedgerError::store(path, e))?;
    Ok(())
}

/// `history.csv` → `history.csv.<suffix>` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
