//! Column Map - Resolves export headers to semantic fields once per sheet

use crate::record::fields;
use serde::Serialize;
use std::collections::HashSet;

/// Semantic fields discoverable from export headers, in resolution order.
/// Candidates are listed most specific first; the bare field name comes last.
/// `days_open` precedes `opened_at` so "Days Open" is never read as a date.
pub const SEMANTIC_FIELDS: &[(&str, &[&str])] = &[
    (
        fields::CASE_ID,
        &[
            "case_id",
            "case number",
            "case id",
            "case no",
            "case #",
            "ticket number",
            "ticket id",
            "ticket no",
            "ticket #",
            "ticket",
        ],
    ),
    (
        fields::BLOCK_IDENTIFIER,
        &["block_identifier", "block id", "block identifier", "premises id", "block code"],
    ),
    (fields::DAYS_OPEN, &["days_open", "days open", "aging", "age (days)"]),
    (fields::OPENED_AT, &["opened_at", "open date", "opened", "created"]),
    (fields::STATUS, &["case status", "ticket status", "status"]),
    (
        fields::ADDRESS,
        &["premises address", "service address", "site address", "service location", "address"],
    ),
];

/// Contact details never stand in for a semantic field by substring.
const CONTACT_WORDS: &[&str] = &["email", "e-mail", "phone", "contact"];

/// Output names for every column of a sheet, plus which semantic fields
/// were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    names: Vec<String>,
    resolved: Vec<(&'static str, usize)>,
}

impl ColumnMap {
    /// Resolve headers against [`SEMANTIC_FIELDS`]. Each header is claimed by
    /// at most one field. An exact header match wins over a substring match;
    /// among substring matches the earlier candidate wins, then the leftmost
    /// header.
    pub fn resolve(headers: &[String]) -> Self {
        let mut names = normalize_headers(headers);
        let lowered: Vec<String> = names.iter().map(|h| h.to_lowercase()).collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut resolved = Vec::new();

        for (field, candidates) in SEMANTIC_FIELDS {
            let hit = find_exact(&lowered, &claimed, candidates)
                .or_else(|| find_contains(&lowered, &claimed, candidates));
            if let Some(idx) = hit {
                claimed.insert(idx);
                resolved.push((*field, idx));
            }
        }

        // Unresolved headers must not shadow a canonical name.
        let canonical: HashSet<&str> = resolved.iter().map(|(f, _)| *f).collect();
        for (idx, name) in names.iter_mut().enumerate() {
            if !claimed.contains(&idx) && canonical.contains(name.as_str()) {
                name.push_str("_source");
            }
        }
        for (field, idx) in &resolved {
            names[*idx] = field.to_string();
        }

        Self { names, resolved }
    }

    /// Output name of column `idx`.
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(|s| s.as_str())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column index of a semantic field, if the sheet carries it.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.resolved
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, idx)| *idx)
    }

    pub fn has(&self, field: &str) -> bool {
        self.index_of(field).is_some()
    }
}

/// First candidate, in priority order, that some unclaimed header equals.
fn find_exact(lowered: &[String], claimed: &HashSet<usize>, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|c| {
        lowered
            .iter()
            .enumerate()
            .find(|(idx, header)| !claimed.contains(idx) && header.as_str() == *c)
            .map(|(idx, _)| idx)
    })
}

/// First candidate, in priority order, contained in some unclaimed header.
fn find_contains(
    lowered: &[String],
    claimed: &HashSet<usize>,
    candidates: &[&str],
) -> Option<usize> {
    candidates.iter().find_map(|c| {
        lowered
            .iter()
            .enumerate()
            .find(|(idx, header)| {
                !claimed.contains(idx)
                    && header.contains(c)
                    && !CONTACT_WORDS.iter().any(|w| header.contains(w))
            })
            .map(|(idx, _)| idx)
    })
}

/// Trim headers, name blank ones by position and suffix duplicates.
fn normalize_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let base = match raw.trim() {
                "" => format!("column_{}", idx + 1),
                trimmed => trimmed.to_string(),
            };
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(h: &[&str]) -> Vec<String> {
        h.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolves_vendor_headers() {
        let map = ColumnMap::resolve(&headers(&[
            "Case Number",
            "Block ID",
            "Case Status",
            "Days Open",
            "Opened Date",
            "Premises Address",
            "Owner",
        ]));
        assert_eq!(
            map.names(),
            &[
                "case_id",
                "block_identifier",
                "status",
                "days_open",
                "opened_at",
                "address",
                "Owner"
            ]
        );
        assert_eq!(map.index_of(fields::STATUS), Some(2));
    }

    #[test]
    fn test_canonical_headers_resolve_to_themselves() {
        let map = ColumnMap::resolve(&headers(&[
            "case_id",
            "block_identifier",
            "zone",
            "snapshot_time",
        ]));
        assert_eq!(map.index_of(fields::CASE_ID), Some(0));
        assert_eq!(map.index_of(fields::BLOCK_IDENTIFIER), Some(1));
        assert_eq!(map.name(2), Some("zone"));
        assert_eq!(map.name(3), Some("snapshot_time"));
    }

    #[test]
    fn test_blank_and_duplicate_headers() {
        let map = ColumnMap::resolve(&headers(&["Notes", "", "Notes", "Notes"]));
        assert_eq!(map.names(), &["Notes", "column_2", "Notes_2", "Notes_3"]);
        assert!(!map.has(fields::CASE_ID));
    }

    #[test]
    fn test_specific_candidate_beats_earlier_weak_match() {
        let map =
            ColumnMap::resolve(&headers(&["Ticket Type", "Case Number", "Block ID", "Status"]));
        assert_eq!(map.index_of(fields::CASE_ID), Some(1));
        assert_eq!(map.index_of(fields::STATUS), Some(3));
        assert_eq!(map.name(0), Some("Ticket Type"));
    }

    #[test]
    fn test_weak_candidate_used_when_nothing_better() {
        let map = ColumnMap::resolve(&headers(&["Ticket", "Status"]));
        assert_eq!(map.index_of(fields::CASE_ID), Some(0));
    }

    #[test]
    fn test_exact_header_beats_leftmost_substring() {
        let map = ColumnMap::resolve(&headers(&["Case Number", "Status Reason", "Status"]));
        assert_eq!(map.index_of(fields::STATUS), Some(2));
        assert_eq!(map.name(1), Some("Status Reason"));
    }

    #[test]
    fn test_contact_columns_never_read_as_address() {
        let map = ColumnMap::resolve(&headers(&[
            "Case Number",
            "Contact Email Address",
            "Block ID",
            "Premises Address",
        ]));
        assert_eq!(map.index_of(fields::ADDRESS), Some(3));
        assert_eq!(map.name(1), Some("Contact Email Address"));

        let only_contact = ColumnMap::resolve(&headers(&["Case Number", "Contact Email Address"]));
        assert!(!only_contact.has(fields::ADDRESS));
    }

    #[test]
    fn test_unresolved_column_cannot_shadow_canonical_name() {
        let map = ColumnMap::resolve(&headers(&["Case Number", "case_id"]));
        assert_eq!(map.names(), &["case_id", "case_id_source"]);
    }
}
