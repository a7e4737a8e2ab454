//! Ingestor - Main ingestion coordinator
//!
//! bytes → RawSheet → header row → ColumnMap → cleaned Table → CaseRecords
//! → decomposed → merged into the history store.

use crate::analysis::{AnalysisReport, RecordFilter, RepeatFaultAnalyzer};
use crate::config::LedgerConfig;
use crate::error::Result;
use crate::export::{to_xlsx_bytes, ExportRequest};
use crate::ingestion::{
    ColumnMap, Decomposer, HeaderLocator, IngestionReport, IngestionWarning, InputFormat, RawSheet,
    RecordCleaner, Table,
};
use crate::record::{fields, CaseRecord};
use crate::store::{CsvHistoryStore, History, HistoryStore};
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Coordinates one upload at a time against a history store.
pub struct Ingestor<S = CsvHistoryStore> {
    store: S,
    locator: HeaderLocator,
    cleaner: RecordCleaner,
    decomposer: Decomposer,
    analyzer: RepeatFaultAnalyzer,
    max_input_bytes: usize,
    preview_rows: usize,
}

impl Ingestor<CsvHistoryStore> {
    /// Ingestor over the CSV store described by `config`.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        let store = CsvHistoryStore::new(&config.history_path)
            .with_policy(config.duplicate_policy)
            .with_lock_timeout(Duration::from_millis(config.lock_timeout_ms));

        Ok(Self::new(store)
            .with_locator(HeaderLocator::new(config.header_min_matches))
            .with_analyzer(RepeatFaultAnalyzer::new(
                config.granularity,
                config.location_threshold,
                config.address_threshold,
            ))
            .with_max_input_bytes(config.max_input_bytes)
            .with_preview_rows(config.preview_rows))
    }
}

impl<S: HistoryStore> Ingestor<S> {
    pub fn new(store: S) -> Self {
        let defaults = LedgerConfig::default();
        Self {
            store,
            locator: HeaderLocator::default(),
            cleaner: RecordCleaner::default(),
            decomposer: Decomposer::new(),
            analyzer: RepeatFaultAnalyzer::default(),
            max_input_bytes: defaults.max_input_bytes,
            preview_rows: defaults.preview_rows,
        }
    }

    pub fn with_locator(mut self, locator: HeaderLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_cleaner(mut self, cleaner: RecordCleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn with_analyzer(mut self, analyzer: RepeatFaultAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn analyzer(&self) -> &RepeatFaultAnalyzer {
        &self.analyzer
    }

    /// Ingest an upload stamped with the current time.
    pub fn ingest(&self, bytes: &[u8], format_hint: &str) -> Result<IngestionReport> {
        self.ingest_at(bytes, format_hint, Utc::now())
    }

    /// Ingest an upload taken at `snapshot`. Decoding and header errors
    /// abort before the store is touched.
    pub fn ingest_at(
        &self,
        bytes: &[u8],
        format_hint: &str,
        snapshot: DateTime<Utc>,
    ) -> Result<IngestionReport> {
        let run_id = Uuid::new_v4().to_string();
        let format = InputFormat::from_hint(format_hint)?;

        let sheet = RawSheet::decode(bytes, format, self.max_input_bytes)?;
        info!(
            "[{}] Decoded {} upload: {} bytes, {} rows",
            run_id,
            format,
            bytes.len(),
            sheet.len()
        );

        let header_row = self.locator.locate(&sheet)?;
        let table = Table::from_sheet(&sheet, header_row);
        let columns = ColumnMap::resolve(&table.headers);

        let mut warnings = Vec::new();
        if !columns.has(fields::CASE_ID) {
            warn!("[{}] No ticket identifier column among {:?}", run_id, columns.names());
            warnings.push(IngestionWarning::MissingCaseIdColumn);
        }

        let (table, cleaning) = self.cleaner.clean(table, &columns);
        let snapshot_time = snapshot.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut records = table.into_records(&columns, &snapshot_time);
        let decomposition = self.decomposer.apply_all(&mut records);
        let cleaned_preview: Vec<CaseRecord> =
            records.iter().take(self.preview_rows).cloned().collect();

        let (new_record_count, total_history_count) = if records.is_empty() {
            warn!("[{}] All rows filtered out, history left untouched", run_id);
            warnings.push(IngestionWarning::AllRowsFiltered);
            (0, self.store.load()?.len())
        } else {
            let merged = self.store.merge(records)?;
            if merged.missing_case_id > 0 {
                warnings.push(IngestionWarning::RecordsWithoutCaseId(merged.missing_case_id));
            }
            (merged.new_record_count, merged.total_history_count)
        };

        info!(
            "[{}] Ingestion complete: {} new tickets, {} in history",
            run_id, new_record_count, total_history_count
        );

        Ok(IngestionReport {
            run_id,
            snapshot_time,
            new_record_count,
            total_history_count,
            cleaned_preview,
            header_row,
            cleaning,
            decomposition,
            warnings,
        })
    }

    /// Full history narrowed by `filter`.
    pub fn filtered_history(&self, filter: &RecordFilter) -> Result<History> {
        let history = self.store.load()?;
        if filter.is_empty() {
            return Ok(history);
        }
        let records = filter.select(history.records());
        Ok(History::new(history.columns().to_vec(), records))
    }

    /// Repeat-fault report over the filtered history.
    pub fn analyze(&self, filter: &RecordFilter) -> Result<AnalysisReport> {
        let history = self.filtered_history(filter)?;
        Ok(self.analyzer.analyze(history.records()))
    }

    /// Spreadsheet bytes of the filtered history.
    pub fn export(&self, filter: &RecordFilter, request: &ExportRequest) -> Result<Vec<u8>> {
        let history = self.filtered_history(filter)?;
        to_xlsx_bytes(history.columns(), history.records(), request)
    }
}
