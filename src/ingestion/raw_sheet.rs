//! Raw Sheet - Decodes an uploaded CSV/XLSX byte stream into an un-headered grid

use crate::error::{LedgerError, Result};
use calamine::{Data, Reader, Xlsx};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use tracing::debug;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Csv,
    Xlsx,
}

impl InputFormat {
    /// Resolve a format hint: `csv`, `.xlsx`, or a file name such as `export.CSV`.
    pub fn from_hint(hint: &str) -> Result<Self> {
        let hint = hint.trim();
        let ext = hint.rsplit('.').next().unwrap_or(hint);
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Csv),
            "xlsx" => Ok(InputFormat::Xlsx),
            _ => Err(LedgerError::UnsupportedFormat(format!(
                "'{}' is neither csv nor xlsx",
                hint
            ))),
        }
    }

    /// Reject content that contradicts the hint.
    fn check_content(self, bytes: &[u8]) -> Result<()> {
        let is_zip = bytes.starts_with(ZIP_SIGNATURE);
        match self {
            InputFormat::Xlsx if !is_zip => Err(LedgerError::UnsupportedFormat(
                "content is not an xlsx workbook".to_string(),
            )),
            InputFormat::Csv if is_zip => Err(LedgerError::UnsupportedFormat(
                "binary archive uploaded as csv".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl FromStr for InputFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hint(s)
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Csv => write!(f, "csv"),
            InputFormat::Xlsx => write!(f, "xlsx"),
        }
    }
}

/// One untyped cell as it came out of the export
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// String form used for keyword matching and for record values.
    /// Integral floats drop the fractional part so ticket numbers survive
    /// spreadsheet round-trips.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            CellValue::Float(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Int(*i),
            Data::Float(f) => CellValue::Float(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(naive) => CellValue::Text(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
                None => CellValue::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) => CellValue::Empty,
        }
    }
}

/// Grid of cells with no header assumed. Immutable once decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSheet {
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Convenience constructor for text-only grids.
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let text: String = cell.into();
                        if text.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::Text(text)
                        }
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Decode an upload. Size is checked before any parsing happens.
    pub fn decode(bytes: &[u8], format: InputFormat, max_bytes: usize) -> Result<Self> {
        if bytes.len() > max_bytes {
            return Err(LedgerError::InputTooLarge {
                size: bytes.len(),
                limit: max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(LedgerError::EmptyFile);
        }
        format.check_content(bytes)?;

        let sheet = match format {
            InputFormat::Csv => Self::decode_csv(bytes)?,
            InputFormat::Xlsx => Self::decode_xlsx(bytes)?,
        };

        if sheet.rows.iter().all(|row| row.iter().all(CellValue::is_empty)) {
            return Err(LedgerError::EmptyFile);
        }

        debug!("Decoded {} sheet with {} rows", format, sheet.rows.len());
        Ok(sheet)
    }

    fn decode_csv(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for result in rdr.byte_records() {
            let record = result.map_err(|e| LedgerError::Decode(format!("csv: {}", e)))?;
            let row = record
                .iter()
                .map(|field| {
                    let text = String::from_utf8_lossy(field);
                    if text.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(text.into_owned())
                    }
                })
                .collect();
            rows.push(row);
        }
        Ok(Self { rows })
    }

    fn decode_xlsx(bytes: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| LedgerError::UnsupportedFormat(format!("xlsx: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or(LedgerError::EmptyFile)?
            .map_err(|e| LedgerError::Decode(format!("xlsx: {}", e)))?;

        let rows = range
            .rows()
            .map(|row| row.iter().map(CellValue::from).collect())
            .collect();
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
