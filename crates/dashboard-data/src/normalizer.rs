//! Raw row → canonical [`Record`].

use std::collections::BTreeMap;

use dashboard_core::models::{is_numeric_field, FieldValue, Record};

use crate::headers::HeaderMap;

/// Converts raw sheet rows into records. Never fails on cell content.
pub struct RowNormalizer;

impl RowNormalizer {
    /// Normalise `row` against `headers`.
    ///
    /// * cells past the header width are ignored
    /// * missing cells read as `""`
    /// * numeric fields use [`FieldValue::numeric`], so a cell that is not
    ///   wholly a number keeps its text and reads through its leading number
    /// * for duplicate header keys the first non-empty cell wins
    pub fn normalize(row: &[String], headers: &HeaderMap, index: usize) -> Record {
        let mut raw: BTreeMap<String, &str> = BTreeMap::new();

        for (col, key) in headers.keys.iter().enumerate() {
            if key.is_empty() {
                continue;
            }
            let cell = row.get(col).map(|c| c.trim()).unwrap_or("");
            let taken = raw.get(key.as_str()).is_some_and(|v| !v.is_empty());
            if !taken {
                raw.insert(key.clone(), cell);
            }
        }

        let fields = raw
            .into_iter()
            .map(|(key, cell)| {
                let value = if is_numeric_field(&key) {
                    FieldValue::numeric(cell)
                } else {
                    FieldValue::Text(cell.to_string())
                };
                (key, value)
            })
            .collect();

        Record::new(Record::row_id(index), fields)
    }

    /// `true` when every cell is empty or whitespace.
    pub fn is_blank(row: &[String]) -> bool {
        row.iter().all(|c| c.trim().is_empty())
    }
}
