//! Repeat-Fault Analyzer - Locations and addresses with recurring tickets
//!
//! Stateless: every query regroups the records it is given.

use crate::analysis::address::normalize_address;
use crate::analysis::frame::{borrow_all, count_at, records_to_frame, records_to_frame_with, str_at};
use crate::error::Result;
use crate::record::{fields, CaseRecord};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

const COUNT: &str = "count";
const DISTINCT_TICKETS: &str = "distinct_tickets";
const ADDRESS_KEY: &str = "address_key";

/// Depth of the location hierarchy used as the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Zone,
    AreaGroup,
    #[default]
    Block,
}

impl Granularity {
    pub fn key_fields(self) -> &'static [&'static str] {
        match self {
            Granularity::Zone => &[fields::ZONE],
            Granularity::AreaGroup => &[fields::ZONE, fields::AREA_GROUP],
            Granularity::Block => &[fields::ZONE, fields::AREA_GROUP, fields::BLOCK],
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "zone" => Ok(Granularity::Zone),
            "area_group" | "areagroup" => Ok(Granularity::AreaGroup),
            "block" => Ok(Granularity::Block),
            other => Err(format!("unknown granularity '{}'", other)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Zone => write!(f, "zone"),
            Granularity::AreaGroup => write!(f, "area_group"),
            Granularity::Block => write!(f, "block"),
        }
    }
}

/// A location whose ticket count exceeded the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRepeat {
    pub zone: String,
    pub area_group: Option<String>,
    pub block: Option<String>,
    pub count: u32,
}

impl LocationRepeat {
    pub fn key(&self) -> Vec<&str> {
        std::iter::once(self.zone.as_str())
            .chain(self.area_group.as_deref())
            .chain(self.block.as_deref())
            .collect()
    }
}

/// A normalized address shared by several distinct tickets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRepeat {
    pub address_key: String,
    /// First spelling seen for this address
    pub sample_address: String,
    pub distinct_tickets: u32,
    pub rows: u32,
}

/// Headline metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_records: usize,
    pub distinct_zone_count: usize,
    pub distinct_area_group_count: usize,
    pub records_without_location: usize,
}

/// A result table that could not be produced from the given records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTable {
    pub table: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: HistorySummary,
    pub granularity: Granularity,
    pub location_repeats: Option<Vec<LocationRepeat>>,
    pub address_repeats: Option<Vec<AddressRepeat>>,
    pub skipped: Vec<SkippedTable>,
}

#[derive(Debug, Clone)]
pub struct RepeatFaultAnalyzer {
    pub granularity: Granularity,
    /// Groups are reported when count > this
    pub location_threshold: u32,
    /// Addresses are reported when distinct tickets > this
    pub address_threshold: u32,
}

impl Default for RepeatFaultAnalyzer {
    fn default() -> Self {
        Self {
            granularity: Granularity::Block,
            location_threshold: 2,
            address_threshold: 1,
        }
    }
}

impl RepeatFaultAnalyzer {
    pub fn new(granularity: Granularity, location_threshold: u32, address_threshold: u32) -> Self {
        Self {
            granularity,
            location_threshold,
            address_threshold,
        }
    }

    /// Row counts per location key, largest first. Rows missing any key
    /// field are left out.
    pub fn location_repeats<R: AsRef<CaseRecord>>(
        &self,
        records: &[R],
    ) -> Result<Vec<LocationRepeat>> {
        let keys = self.granularity.key_fields();
        let df = records_to_frame(&borrow_all(records), keys)?;

        let mut lf = df.lazy();
        if let Some(present) = keys.iter().map(|k| col(k).is_not_null()).reduce(|a, b| a.and(b)) {
            lf = lf.filter(present);
        }
        let grouped = lf
            .group_by(keys.iter().map(|k| col(k)).collect::<Vec<_>>())
            .agg([len().cast(DataType::UInt32).alias(COUNT)])
            .filter(col(COUNT).gt(lit(self.location_threshold)))
            .collect()?;

        let mut repeats = Vec::with_capacity(grouped.height());
        for i in 0..grouped.height() {
            let Some(zone) = str_at(&grouped, fields::ZONE, i)? else {
                continue;
            };
            let area_group = match self.granularity {
                Granularity::Zone => None,
                _ => str_at(&grouped, fields::AREA_GROUP, i)?,
            };
            let block = match self.granularity {
                Granularity::Block => str_at(&grouped, fields::BLOCK, i)?,
                _ => None,
            };
            repeats.push(LocationRepeat {
                zone,
                area_group,
                block,
                count: count_at(&grouped, COUNT, i)?,
            });
        }

        repeats.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key().cmp(&b.key())));
        debug!("{} location groups above {}", repeats.len(), self.location_threshold);
        Ok(repeats)
    }

    /// Distinct ticket ids per normalized address, largest first. A ticket
    /// exported several times counts once.
    pub fn address_repeats<R: AsRef<CaseRecord>>(
        &self,
        records: &[R],
    ) -> Result<Vec<AddressRepeat>> {
        let df = records_to_frame_with(
            &borrow_all(records),
            &[fields::CASE_ID, fields::ADDRESS],
            ADDRESS_KEY,
            |r| r.get(fields::ADDRESS).and_then(normalize_address),
        )?;

        let grouped = df
            .lazy()
            .filter(col(fields::CASE_ID).is_not_null().and(col(ADDRESS_KEY).is_not_null()))
            .group_by([col(ADDRESS_KEY)])
            .agg([
                col(fields::CASE_ID).n_unique().cast(DataType::UInt32).alias(DISTINCT_TICKETS),
                len().cast(DataType::UInt32).alias(COUNT),
                col(fields::ADDRESS).first().alias(fields::ADDRESS),
            ])
            .filter(col(DISTINCT_TICKETS).gt(lit(self.address_threshold)))
            .collect()?;

        let mut repeats = Vec::with_capacity(grouped.height());
        for i in 0..grouped.height() {
            let Some(address_key) = str_at(&grouped, ADDRESS_KEY, i)? else {
                continue;
            };
            let sample_address = str_at(&grouped, fields::ADDRESS, i)?
                .unwrap_or_else(|| address_key.clone());
            repeats.push(AddressRepeat {
                address_key,
                sample_address,
                distinct_tickets: count_at(&grouped, DISTINCT_TICKETS, i)?,
                rows: count_at(&grouped, COUNT, i)?,
            });
        }

        repeats.sort_by(|a, b| {
            b.distinct_tickets
                .cmp(&a.distinct_tickets)
                .then_with(|| a.address_key.cmp(&b.address_key))
        });
        debug!("{} addresses above {}", repeats.len(), self.address_threshold);
        Ok(repeats)
    }

    pub fn summary<R: AsRef<CaseRecord>>(&self, records: &[R]) -> Result<HistorySummary> {
        let records = borrow_all(records);
        let df = records_to_frame(&records, &[fields::ZONE, fields::AREA_GROUP])?;
        Ok(HistorySummary {
            total_records: records.len(),
            distinct_zone_count: df.column(fields::ZONE)?.drop_nulls().n_unique()?,
            distinct_area_group_count: df.column(fields::AREA_GROUP)?.drop_nulls().n_unique()?,
            records_without_location: records.iter().filter(|r| !r.has_location()).count(),
        })
    }

    /// Every table the records support. A table whose columns are absent,
    /// or whose computation fails, is listed in `skipped` instead.
    pub fn analyze<R: AsRef<CaseRecord>>(&self, records: &[R]) -> AnalysisReport {
        let records = borrow_all(records);
        let mut report = AnalysisReport {
            granularity: self.granularity,
            ..Default::default()
        };

        match self.summary(&records) {
            Ok(summary) => report.summary = summary,
            Err(e) => skip(&mut report, "summary", e.to_string()),
        }

        let has_location = records
            .iter()
            .any(|r| self.granularity.key_fields().iter().all(|f| r.contains(f)));
        if !has_location {
            skip(
                &mut report,
                "location_repeats",
                "no record carries a decoded location".to_string(),
            );
        } else {
            match self.location_repeats(&records) {
                Ok(rows) => report.location_repeats = Some(rows),
                Err(e) => skip(&mut report, "location_repeats", e.to_string()),
            }
        }

        let has_address = records
            .iter()
            .any(|r| r.contains(fields::ADDRESS) && r.case_id().is_some());
        if !has_address {
            skip(
                &mut report,
                "address_repeats",
                "no record carries both a case id and an address".to_string(),
            );
        } else {
            match self.address_repeats(&records) {
                Ok(rows) => report.address_repeats = Some(rows),
                Err(e) => skip(&mut report, "address_repeats", e.to_string()),
            }
        }

        report
    }
}

fn skip(report: &mut AnalysisReport, table: &str, reason: String) {
    warn!("Skipping {}: {}", table, reason);
    report.skipped.push(SkippedTable {
        table: table.to_string(),
        reason,
    });
}
