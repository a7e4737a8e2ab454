//! Analysis - Repeat-fault reporting over the ticket history

pub mod address;
pub mod filter;
pub mod frame;
pub mod repeat;

pub use address::normalize_address;
pub use filter::RecordFilter;
pub use repeat::{
    AddressRepeat, AnalysisReport, Granularity, HistorySummary, LocationRepeat, RepeatFaultAnalyzer,
    SkippedTable,
};
