//! In-memory filtering, sorting and column projection over records.
//!
//! Every function here is pure: records are borrowed, never mutated, and an
//! empty or unmatched query yields an empty result rather than an error.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use dashboard_core::data_processors::{DateParser, NumericParser};
use dashboard_core::models::{field_position, keys, Record, FIELDS};
use serde::{Deserialize, Serialize};

/// Sentinel shown in pickers for "no restriction".
pub const ALL: &str = "all";

// ── State types ───────────────────────────────────────────────────────────────

/// One categorical filter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    All,
    Value(String),
}

impl Selection {
    /// `"all"` (any case) → [`Selection::All`], anything else → exact value.
    pub fn from_choice(choice: &str) -> Self {
        if choice.eq_ignore_ascii_case(ALL) {
            Selection::All
        } else {
            Selection::Value(choice.to_string())
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Value(v) => v == value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn ascending(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Clicking a column header: the same key flips direction, a new key
    /// starts ascending.
    pub fn toggle(current: Option<&SortState>, key: &str) -> SortState {
        match current {
            Some(s) if s.key == key => SortState {
                key: key.to_string(),
                direction: s.direction.flipped(),
            },
            _ => SortState::ascending(key),
        }
    }
}

/// Inclusive month window, 1-12. `start > end` wraps over the new year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: u32,
    pub end: u32,
}

impl MonthRange {
    /// `None` unless both months are within 1-12.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        let valid = 1..=12;
        (valid.contains(&start) && valid.contains(&end)).then_some(Self { start, end })
    }

    pub fn contains(&self, month: u32) -> bool {
        if self.start <= self.end {
            (self.start..=self.end).contains(&month)
        } else {
            month >= self.start || month <= self.end
        }
    }
}

/// Multi-select over one field, e.g. a set of teachers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSelection {
    pub field: String,
    pub values: BTreeSet<String>,
}

/// Everything the table view needs to derive its rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryState {
    pub search: String,
    pub categorical: BTreeMap<String, Selection>,
    pub group_selection: Option<GroupSelection>,
    pub month_range: Option<MonthRange>,
    pub sort: Option<SortState>,
    pub visible_columns: BTreeSet<String>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            categorical: BTreeMap::new(),
            group_selection: None,
            month_range: None,
            sort: None,
            visible_columns: FIELDS
                .iter()
                .filter(|f| f.default_visible)
                .map(|f| f.key.to_string())
                .collect(),
        }
    }
}

impl QueryState {
    pub fn with_search(&self, search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..self.clone()
        }
    }

    pub fn with_selection(&self, field: &str, selection: Selection) -> Self {
        let mut next = self.clone();
        match selection {
            Selection::All => {
                next.categorical.remove(field);
            }
            value => {
                next.categorical.insert(field.to_string(), value);
            }
        }
        next
    }

    pub fn with_group_selection(&self, selection: Option<GroupSelection>) -> Self {
        Self {
            group_selection: selection,
            ..self.clone()
        }
    }

    pub fn with_month_range(&self, range: Option<MonthRange>) -> Self {
        Self {
            month_range: range,
            ..self.clone()
        }
    }

    /// Apply [`SortState::toggle`] for `key`.
    pub fn with_sort_toggled(&self, key: &str) -> Self {
        Self {
            sort: Some(SortState::toggle(self.sort.as_ref(), key)),
            ..self.clone()
        }
    }

    pub fn with_column_toggled(&self, key: &str) -> Self {
        let mut next = self.clone();
        if !next.visible_columns.remove(key) {
            next.visible_columns.insert(key.to_string());
        }
        next
    }

    pub fn selection(&self, field: &str) -> &Selection {
        const ALL_SELECTION: &Selection = &Selection::All;
        self.categorical.get(field).unwrap_or(ALL_SELECTION)
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Case-insensitive substring match over every field's text and the id.
pub fn matches_search(record: &Record, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record.id.to_lowercase().contains(&needle)
        || record
            .fields
            .values()
            .any(|v| v.as_text().to_lowercase().contains(&needle))
}

pub fn filter_search<'a>(records: &[&'a Record], query: &str) -> Vec<&'a Record> {
    records
        .iter()
        .copied()
        .filter(|r| matches_search(r, query))
        .collect()
}

/// AND of every categorical selection.
pub fn filter_categorical<'a>(
    records: &[&'a Record],
    selections: &BTreeMap<String, Selection>,
) -> Vec<&'a Record> {
    records
        .iter()
        .copied()
        .filter(|r| {
            selections
                .iter()
                .all(|(field, sel)| sel.matches(&r.text(field)))
        })
        .collect()
}

/// Keep records whose `field` is in the selected set. An empty set matches
/// nothing.
pub fn filter_group_selection<'a>(
    records: &[&'a Record],
    selection: &GroupSelection,
) -> Vec<&'a Record> {
    records
        .iter()
        .copied()
        .filter(|r| selection.values.contains(&r.text(&selection.field)))
        .collect()
}

/// Keep records whose date falls inside `range`; unparseable dates are
/// excluded.
pub fn filter_month_range<'a>(records: &[&'a Record], range: &MonthRange) -> Vec<&'a Record> {
    records
        .iter()
        .copied()
        .filter(|r| {
            DateParser::month(&r.text(keys::DATE))
                .map(|m| range.contains(m))
                .unwrap_or(false)
        })
        .collect()
}

/// `["all", ...distinct values of field in first-occurrence order]`.
/// Empty values are left out.
pub fn distinct_values(records: &[Record], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = vec![ALL.to_string()];
    for r in records {
        let value = r.text(field);
        if !value.is_empty() && seen.insert(value.clone()) {
            out.push(value);
        }
    }
    out
}

// ── Sorting ───────────────────────────────────────────────────────────────────

/// Numeric-aware total order on cell text.
///
/// Cells that are wholly a finite number (after stripping `,`) sort before
/// text and compare by value; text, including dates and `"60 min"`,
/// compares by its lowercase form.
pub fn compare_values(a: &str, b: &str) -> Ordering {
    match (NumericParser::parse_exact(a), NumericParser::parse_exact(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Stable sort by `sort.key`.
pub fn sort_records<'a>(records: &mut [&'a Record], sort: &SortState) {
    let keyed: Vec<String> = records.iter().map(|r| r.text(&sort.key)).collect();
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&i, &j| {
        let ord = compare_values(&keyed[i], &keyed[j]);
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    let sorted: Vec<&'a Record> = order.into_iter().map(|i| records[i]).collect();
    records.copy_from_slice(&sorted);
}

// ── Projection ────────────────────────────────────────────────────────────────

/// Visible keys in registry order, followed by non-registry keys
/// alphabetically.
pub fn project_columns(visible: &BTreeSet<String>) -> Vec<String> {
    let mut registry: Vec<&String> = visible
        .iter()
        .filter(|k| field_position(k).is_some())
        .collect();
    registry.sort_by_key(|k| field_position(k));
    registry
        .into_iter()
        .chain(visible.iter().filter(|k| field_position(k).is_none()))
        .cloned()
        .collect()
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Derive the table rows: categorical → group selection → month → search →
/// sort.
pub fn apply<'a>(records: &'a [Record], state: &QueryState) -> Vec<&'a Record> {
    let all: Vec<&Record> = records.iter().collect();
    let mut rows = filter_categorical(&all, &state.categorical);
    if let Some(sel) = &state.group_selection {
        rows = filter_group_selection(&rows, sel);
    }
    if let Some(range) = &state.month_range {
        rows = filter_month_range(&rows, range);
    }
    rows = filter_search(&rows, &state.search);
    if let Some(sort) = &state.sort {
        sort_records(&mut rows, sort);
    }
    rows
}
