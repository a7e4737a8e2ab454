//! Builds polars frames from case records for grouping

use crate::error::Result;
use crate::record::CaseRecord;
use polars::prelude::*;

/// Frame with one nullable string column per requested field.
pub fn records_to_frame(records: &[&CaseRecord], columns: &[&str]) -> Result<DataFrame> {
    let series: Vec<Series> = columns
        .iter()
        .map(|name| {
            let values: Vec<Option<&str>> = records.iter().map(|r| r.get(name)).collect();
            Series::new(name, values)
        })
        .collect();
    Ok(DataFrame::new(series)?)
}

/// Frame with a derived column alongside the requested fields.
pub fn records_to_frame_with<F>(
    records: &[&CaseRecord],
    columns: &[&str],
    derived_name: &str,
    derive: F,
) -> Result<DataFrame>
where
    F: Fn(&CaseRecord) -> Option<String>,
{
    let mut df = records_to_frame(records, columns)?;
    let derived: Vec<Option<String>> = records.iter().map(|r| derive(*r)).collect();
    df.with_column(Series::new(derived_name, derived))?;
    Ok(df)
}

/// Borrow a slice of owned or borrowed records uniformly.
pub fn borrow_all<R: AsRef<CaseRecord>>(records: &[R]) -> Vec<&CaseRecord> {
    records.iter().map(|r| r.as_ref()).collect()
}

/// Non-null string at `idx` of a string column.
pub(crate) fn str_at(df: &DataFrame, column: &str, idx: usize) -> Result<Option<String>> {
    Ok(df.column(column)?.str()?.get(idx).map(|s| s.to_string()))
}

/// Count at `idx` of a count column cast to `UInt32`.
pub(crate) fn count_at(df: &DataFrame, column: &str, idx: usize) -> Result<u32> {
    Ok(df.column(column)?.u32()?.get(idx).unwrap_or(0))
}
