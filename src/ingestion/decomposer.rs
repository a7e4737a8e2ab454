//! Identifier Decomposer - Derives zone / area group / block / street
//!
//! Block identifiers look like `<prefix>-<region>-<subregion>-<area_group>-<block>`.
//! Malformed identifiers are expected in real exports and are skipped
//! silently; the skip is counted, never raised.

use crate::record::{fields, CaseRecord};
use serde::{Deserialize, Serialize};
use tracing::info;

const MIN_SEGMENTS: usize = 5;

/// Location hierarchy parsed from a block identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationParts {
    pub zone: String,
    pub area_group: String,
    pub block: String,
}

/// `VR-PHX-25-AG1-B012` → zone `PHX-25`, area group `AG1`, block `B012`.
/// Segments past the fifth are ignored.
pub fn decompose_identifier(identifier: &str) -> Option<LocationParts> {
    let segments: Vec<&str> = identifier.trim().split('-').map(str::trim).collect();
    if segments.len() < MIN_SEGMENTS {
        return None;
    }
    if segments[1..MIN_SEGMENTS].iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(LocationParts {
        zone: format!("{}-{}", segments[1], segments[2]),
        area_group: segments[3].to_string(),
        block: segments[4].to_string(),
    })
}

/// Street name from a free-text address: the part before the first comma
/// with its first token (normally the house number) removed.
pub fn extract_street(address: &str) -> Option<String> {
    let head = address.split(',').next().unwrap_or("");
    let street = head.split_whitespace().skip(1).collect::<Vec<_>>().join(" ");
    if street.is_empty() {
        None
    } else {
        Some(street)
    }
}

/// Per-batch decomposition counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompositionStats {
    pub decomposed: usize,
    pub malformed: usize,
    pub missing_identifier: usize,
    pub streets_extracted: usize,
}

impl DecompositionStats {
    /// Records left without a derived location.
    pub fn skipped(&self) -> usize {
        self.malformed + self.missing_identifier
    }
}

#[derive(Debug, Clone, Default)]
pub struct Decomposer;

impl Decomposer {
    pub fn new() -> Self {
        Self
    }

    /// Set or clear the derived fields of one record. Returns whether a
    /// location was derived.
    pub fn apply(&self, record: &mut CaseRecord, stats: &mut DecompositionStats) -> bool {
        let parts = match record.get(fields::BLOCK_IDENTIFIER) {
            Some(identifier) => {
                let parts = decompose_identifier(identifier);
                if parts.is_none() {
                    stats.malformed += 1;
                }
                parts
            }
            None => {
                stats.missing_identifier += 1;
                None
            }
        };

        let derived = match parts {
            Some(parts) => {
                record.set(fields::ZONE, parts.zone);
                record.set(fields::AREA_GROUP, parts.area_group);
                record.set(fields::BLOCK, parts.block);
                stats.decomposed += 1;
                true
            }
            None => {
                for field in fields::LOCATION {
                    record.remove(field);
                }
                false
            }
        };

        if let Some(street) = record.get(fields::ADDRESS).and_then(extract_street) {
            record.set(fields::STREET, street);
            stats.streets_extracted += 1;
        }

        derived
    }

    pub fn apply_all(&self, records: &mut [CaseRecord]) -> DecompositionStats {
        let mut stats = DecompositionStats::default();
        for record in records.iter_mut() {
            self.apply(record, &mut stats);
        }
        if stats.skipped() > 0 {
            info!(
                "Decomposition skipped for {} of {} records ({} malformed, {} without identifier)",
                stats.skipped(),
                records.len(),
                stats.malformed,
                stats.missing_identifier
            );
        }
        stats
    }
}
