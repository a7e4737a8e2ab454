//! Runtime configuration
//!
//! Defaults, then an optional JSON file, then `LEDGER_*` environment variables.

use crate::analysis::Granularity;
use crate::error::{LedgerError, Result};
use crate::store::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Location of the flat history file
    pub history_path: PathBuf,

    /// Uploads larger than this are rejected before decoding
    pub max_input_bytes: usize,

    /// Marker cells a row needs to count as the header row
    pub header_min_matches: usize,

    /// Location groups are reported when their count exceeds this
    pub location_threshold: u32,

    /// Addresses are reported when their distinct-ticket count exceeds this
    pub address_threshold: u32,

    pub granularity: Granularity,

    pub duplicate_policy: DuplicatePolicy,

    /// How long a merge waits for the store lease
    pub lock_timeout_ms: u64,

    /// Records echoed back in the ingestion report
    pub preview_rows: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            history_path: PathBuf::from("data/history.csv"),
            max_input_bytes: 50 * 1024 * 1024,
            header_min_matches: 2,
            location_threshold: 2,
            address_threshold: 1,
            granularity: Granularity::Block,
            duplicate_policy: DuplicatePolicy::KeepFirst,
            lock_timeout_ms: 5_000,
            preview_rows: 50,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: LedgerConfig = serde_json::from_str(&content)
            .map_err(|e| LedgerError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `LEDGER_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LEDGER_HISTORY_PATH") {
            self.history_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LEDGER_MAX_INPUT_BYTES") {
            self.max_input_bytes = parse_var("LEDGER_MAX_INPUT_BYTES", &v)?;
        }
        if let Some(v) = lookup("LEDGER_HEADER_MIN_MATCHES") {
            self.header_min_matches = parse_var("LEDGER_HEADER_MIN_MATCHES", &v)?;
        }
        if let Some(v) = lookup("LEDGER_LOCATION_THRESHOLD") {
            self.location_threshold = parse_var("LEDGER_LOCATION_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("LEDGER_ADDRESS_THRESHOLD") {
            self.address_threshold = parse_var("LEDGER_ADDRESS_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("LEDGER_GRANULARITY") {
            self.granularity = parse_var("LEDGER_GRANULARITY", &v)?;
        }
        if let Some(v) = lookup("LEDGER_DUPLICATE_POLICY") {
            self.duplicate_policy = parse_var("LEDGER_DUPLICATE_POLICY", &v)?;
        }
        if let Some(v) = lookup("LEDGER_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = parse_var("LEDGER_LOCK_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("LEDGER_PREVIEW_ROWS") {
            self.preview_rows = parse_var("LEDGER_PREVIEW_ROWS", &v)?;
        }
        self.validate()?;
        debug!("Effective configuration: {:?}", self);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // A single matching banner cell must never qualify as a header.
        if self.header_min_matches < 2 {
            return Err(LedgerError::Config(format!(
                "header_min_matches must be at least 2, got {}",
                self.header_min_matches
            )));
        }
        if self.max_input_bytes == 0 {
            return Err(LedgerError::Config("max_input_bytes must be positive".to_string()));
        }
        if self.history_path.as_os_str().is_empty() {
            return Err(LedgerError::Config("history_path must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| LedgerError::Config(format!("{}={:?}: {}", key, raw, e)))
}
