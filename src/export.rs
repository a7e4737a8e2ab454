//! Export - History view as a spreadsheet

use crate::error::{LedgerError, Result};
use crate::record::CaseRecord;
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::info;

const SHEET_NAME: &str = "History";

/// Which columns to write. `None` writes every history column in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub columns: Option<Vec<String>>,
}

impl ExportRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
        }
    }

    /// Requested columns checked against what history holds.
    fn resolve<'a>(&'a self, available: &'a [String]) -> Result<Vec<&'a str>> {
        match &self.columns {
            None => Ok(available.iter().map(String::as_str).collect()),
            Some(requested) => requested
                .iter()
                .map(|c| {
                    if available.iter().any(|a| a == c) {
                        Ok(c.as_str())
                    } else {
                        Err(LedgerError::UnknownColumn(c.clone()))
                    }
                })
                .collect(),
        }
    }
}

/// One worksheet, bold header row, one row per record. Absent fields are
/// left blank.
pub fn to_xlsx_bytes(
    available: &[String],
    records: &[CaseRecord],
    request: &ExportRequest,
) -> Result<Vec<u8>> {
    let columns = request.resolve(available)?;

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col_num(col)?, *name, &header)?;
    }
    for (row, record) in records.iter().enumerate() {
        let row = u32::try_from(row + 1)
            .map_err(|_| LedgerError::Export("too many rows".to_string()))?;
        for (col, name) in columns.iter().enumerate() {
            if let Some(value) = record.get(name) {
                sheet.write_string(row, col_num(col)?, value)?;
            }
        }
    }
    sheet.autofit();

    let bytes = workbook.save_to_buffer()?;
    info!(
        "Exported {} records x {} columns ({} bytes)",
        records.len(),
        columns.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Download name for an export taken on `date`.
pub fn report_file_name(date: NaiveDate) -> String {
    format!("report_{}.xlsx", date.format("%Y%m%d"))
}

fn col_num(col: usize) -> Result<u16> {
    u16::try_from(col).map_err(|_| LedgerError::Export("too many columns".to_string()))
}
