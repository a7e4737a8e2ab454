use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Header row not found after scanning {rows_scanned} rows")]
    HeaderNotFound { rows_scanned: usize },

    #[error("Empty file: no rows to ingest")]
    EmptyFile,

    #[error("Input too large: {size} bytes exceeds limit of {limit} bytes")]
    InputTooLarge { size: usize, limit: usize },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("History store unavailable at {path}: {reason}")]
    StoreUnavailable { path: String, reason: String },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl LedgerError {
    /// Pipeline step that produced the error, for operator-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            LedgerError::UnsupportedFormat(_)
            | LedgerError::EmptyFile
            | LedgerError::InputTooLarge { .. }
            | LedgerError::Decode(_) => "decode",
            LedgerError::HeaderNotFound { .. } => "header",
            LedgerError::StoreUnavailable { .. } => "store",
            LedgerError::UnknownColumn(_) | LedgerError::Export(_) => "export",
            LedgerError::Polars(_) => "analysis",
            LedgerError::Config(_) => "config",
            LedgerError::Io(_) | LedgerError::Json(_) => "io",
        }
    }

    pub(crate) fn store(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        LedgerError::StoreUnavailable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for LedgerError {
    fn from(err: polars::error::PolarsError) -> Self {
        LedgerError::Polars(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for LedgerError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        LedgerError::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
