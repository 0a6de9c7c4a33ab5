//! Header row detection and header → canonical key resolution.

use std::collections::HashMap;

use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::{keys, FIELDS};
use regex::Regex;
use tracing::debug;

/// Default anchor label that identifies the header row.
pub const DEFAULT_ANCHOR: &str = "Date";

/// Sheet header spellings seen in the wild, beyond the registry labels.
///
/// Matching is case-insensitive on the whitespace-collapsed form, so one
/// entry covers every line-break variant of the same header.
const ALIASES: &[(&str, &str)] = &[
    ("Class Date", keys::DATE),
    ("Teacher", keys::TEACHER),
    ("Teacher1", keys::TEACHER),
    ("Teacher 1/ Main Teacher", keys::TEACHER),
    ("Teacher 1 Gmail", keys::TEACHER1_GMAIL),
    ("Teacher 1 Email", keys::TEACHER1_GMAIL),
    ("Teacher 2/ Doubt Solver 1", keys::TEACHER2),
    ("Teacher 2/ Doubt Solver 1 Gmail", keys::TEACHER2_GMAIL),
    ("Teacher 2 Email", keys::TEACHER2_GMAIL),
    ("Teacher 3/ Doubt Solver 2", keys::TEACHER3),
    ("Teacher 3/ Doubt Solver 2 Gmail", keys::TEACHER3_GMAIL),
    ("Teacher 3 Email", keys::TEACHER3_GMAIL),
    ("Time", keys::SCHEDULED_TIME),
    ("Class Scheduled Time", keys::SCHEDULED_TIME),
    ("Slide QAC Status", keys::SLIDE_QAC),
    ("Product", keys::PRODUCT_TYPE),
    ("Annotated Slide Link", keys::ANNOTATED_SLIDE_LINK),
    ("Class Link", keys::CLASS_LINK),
    ("Live Class Link", keys::CLASS_LINK),
    ("Start Delay (Minutes)", keys::START_DELAY_MINUTES),
    ("Start Delay", keys::START_DELAY_MINUTES),
    ("Total Duration (Minutes)", keys::TOTAL_DURATION_MINUTES),
    ("Total Duration", keys::TOTAL_DURATION_MINUTES),
    ("Duration (min)", keys::TOTAL_DURATION_MINUTES),
    ("Peak Attendance", keys::HIGHEST_ATTENDANCE),
    ("Avg Attendance", keys::AVERAGE_ATTENDANCE),
    ("Comments", keys::TOTAL_COMMENTS),
    ("View Count (10 Min)", keys::VIEW_COUNT_10_MIN),
    ("View Count After 10 Min", keys::VIEW_COUNT_10_MIN),
    ("View Count (40-50 Min)", keys::VIEW_COUNT_40_50_MIN),
    ("View Count 40-50 Min", keys::VIEW_COUNT_40_50_MIN),
    ("View Count (Before End)", keys::VIEW_COUNT_BEFORE_END),
    ("View Count Before End", keys::VIEW_COUNT_BEFORE_END),
    ("Class QAC Feedback", keys::CLASS_QAC_FEEDBACK),
    ("Satisfaction Score", keys::SATISFACTION),
    ("Student Satisfaction", keys::SATISFACTION),
];

// ── HeaderMap ─────────────────────────────────────────────────────────────────

/// Positional canonical keys for one header row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMap {
    /// One key per header cell, same order as the sheet. Empty header cells
    /// resolve to `""` and their column is ignored.
    pub keys: Vec<String>,
    /// Non-empty headers that matched no alias and were kept verbatim.
    pub unmapped: Vec<String>,
}

impl HeaderMap {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ── HeaderResolver ────────────────────────────────────────────────────────────

/// Maps free-text header labels onto canonical field keys.
#[derive(Debug, Clone)]
pub struct HeaderResolver {
    aliases: HashMap<String, &'static str>,
    extra: HashMap<String, String>,
    whitespace: Regex,
}

impl Default for HeaderResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderResolver {
    /// Resolver seeded with registry labels, registry keys and [`ALIASES`].
    pub fn new() -> Self {
        let whitespace = Regex::new(r"\s+").expect("regex is valid");
        let mut aliases = HashMap::new();
        for def in FIELDS {
            aliases.insert(def.key.to_lowercase(), def.key);
            aliases.insert(def.label.to_lowercase(), def.key);
        }
        for (label, key) in ALIASES {
            let folded = whitespace.replace_all(label.trim(), " ").to_lowercase();
            aliases.insert(folded, *key);
        }
        Self {
            aliases,
            extra: HashMap::new(),
            whitespace,
        }
    }

    /// Add caller-supplied aliases. Later entries override built-in ones.
    pub fn with_aliases<I, L, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (L, K)>,
        L: AsRef<str>,
        K: Into<String>,
    {
        for (label, key) in entries {
            let folded = self.fold(label.as_ref());
            self.extra.insert(folded, key.into());
        }
        self
    }

    /// Trim and collapse internal whitespace runs to one space.
    pub fn normalize_label(&self, raw: &str) -> String {
        self.whitespace.replace_all(raw.trim(), " ").into_owned()
    }

    fn fold(&self, raw: &str) -> String {
        self.normalize_label(raw).to_lowercase()
    }

    /// Canonical key for one header, or `None` when no alias matches.
    pub fn lookup(&self, raw: &str) -> Option<String> {
        let folded = self.fold(raw);
        if let Some(key) = self.extra.get(&folded) {
            return Some(key.clone());
        }
        self.aliases.get(&folded).map(|k| k.to_string())
    }

    /// Resolve a whole header row. Misses fall back to the trimmed header text.
    pub fn resolve_all(&self, headers: &[String]) -> HeaderMap {
        let mut map = HeaderMap::default();
        for raw in headers {
            let trimmed = raw.trim();
            match self.lookup(trimmed) {
                Some(key) => map.keys.push(key),
                None => {
                    if !trimmed.is_empty() {
                        debug!("Unmapped header kept verbatim: {:?}", trimmed);
                        map.unmapped.push(trimmed.to_string());
                    }
                    map.keys.push(trimmed.to_string());
                }
            }
        }
        map
    }

    /// Index of the first row holding a cell equal to `anchor` after trimming.
    pub fn find_header_row(rows: &[Vec<String>], anchor: &str) -> Result<usize> {
        rows.iter()
            .position(|row| row.iter().any(|cell| cell.trim() == anchor))
            .ok_or_else(|| DashboardError::HeaderRowNotFound {
                anchor: anchor.to_string(),
                rows_scanned: rows.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    // ── lookup ───────────────────────────────────────────────────────────────

    #[test]
    fn test_multiline_header_variants_resolve_to_same_key() {
        let resolver = HeaderResolver::new();
        assert_eq!(
            resolver.lookup("Teacher 2/\nDoubt Solver 1").as_deref(),
            Some(keys::TEACHER2)
        );
        assert_eq!(
            resolver.lookup("Teacher 2/ Doubt Solver 1").as_deref(),
            Some(keys::TEACHER2)
        );
        assert_eq!(
            resolver.lookup("  Teacher 2/\r\n  Doubt   Solver 1 ").as_deref(),
            Some(keys::TEACHER2)
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let resolver = HeaderResolver::new();
        assert_eq!(
            resolver.lookup("HIGHEST ATTENDANCE").as_deref(),
            Some(keys::HIGHEST_ATTENDANCE)
        );
        assert_eq!(resolver.lookup("date").as_deref(), Some(keys::DATE));
    }

    #[test]
    fn test_every_registry_label_resolves_to_its_key() {
        let resolver = HeaderResolver::new();
        for def in FIELDS {
            assert_eq!(resolver.lookup(def.label).as_deref(), Some(def.key));
            assert_eq!(resolver.lookup(def.key).as_deref(), Some(def.key));
        }
    }

    #[test]
    fn test_teacher_spellings_share_primary_key() {
        let resolver = HeaderResolver::new();
        for label in ["Teacher", "Teacher 1", "Teacher1"] {
            assert_eq!(resolver.lookup(label).as_deref(), Some(keys::TEACHER));
        }
    }

    #[test]
    fn test_with_aliases_extends_table() {
        let resolver = HeaderResolver::new().with_aliases([("Instructor", keys::TEACHER)]);
        assert_eq!(resolver.lookup("instructor").as_deref(), Some(keys::TEACHER));
    }

    // ── resolve_all ──────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_all_keeps_position_and_length() {
        let resolver = HeaderResolver::new();
        let map = resolver.resolve_all(&strings(&["Date", "Mystery Column ", "", "Teacher"]));
        assert_eq!(
            map.keys,
            strings(&[keys::DATE, "Mystery Column", "", keys::TEACHER])
        );
        assert_eq!(map.unmapped, strings(&["Mystery Column"]));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_unmapped_fallback_keeps_internal_whitespace() {
        let resolver = HeaderResolver::new();
        let map = resolver.resolve_all(&strings(&["  Odd\nHeader  "]));
        assert_eq!(map.keys, strings(&["Odd\nHeader"]));
    }

    // ── find_header_row ──────────────────────────────────────────────────────

    #[test]
    fn test_find_header_row_skips_preamble() {
        let rows = vec![
            strings(&["Class schedule", ""]),
            strings(&[]),
            strings(&[" Date ", "Teacher"]),
            strings(&["2024-01-01", "Alice"]),
        ];
        assert_eq!(HeaderResolver::find_header_row(&rows, "Date").unwrap(), 2);
    }

    #[test]
    fn test_find_header_row_requires_exact_cell() {
        let rows = vec![strings(&["Date of class", "Teacher"])];
        let err = HeaderResolver::find_header_row(&rows, "Date").unwrap_err();
        assert!(matches!(
            err,
            DashboardError::HeaderRowNotFound { rows_scanned: 1, .. }
        ));
    }

    #[test]
    fn test_find_header_row_custom_anchor() {
        let rows = vec![strings(&["Fecha", "Profesor"])];
        assert_eq!(HeaderResolver::find_header_row(&rows, "Fecha").unwrap(), 0);
    }

    #[test]
    fn test_find_header_row_empty_grid() {
        assert!(HeaderResolver::find_header_row(&[], DEFAULT_ANCHOR).is_err());
    }
}
