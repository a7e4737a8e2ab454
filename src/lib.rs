pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod record;
pub mod store;

pub use analysis::{AnalysisReport, Granularity, RecordFilter, RepeatFaultAnalyzer};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use export::{report_file_name, to_xlsx_bytes, ExportRequest};
pub use ingestion::{Ingestor, IngestionReport, IngestionWarning, InputFormat};
pub use record::CaseRecord;
pub use store::{CsvHistoryStore, DuplicatePolicy, HistoryStore, MergeReport};
