use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;

// ── NumericParser ─────────────────────────────────────────────────────────────

/// Parses the loosely formatted numbers found in spreadsheet cells.
///
/// Cells carry thousands separators (`"1,234"`), dashes for "no value" and
/// units or notes after the number (`"60 min"`, `"120 (approx)"`). The
/// leading number is taken and everything after it ignored. Every failure
/// collapses to `None` (or `0.0` via [`NumericParser::coerce`]) so sums never
/// see NaN.
pub struct NumericParser;

impl NumericParser {
    /// Character stripped before parsing.
    pub const THOUSANDS_SEPARATOR: char = ',';

    fn leading_number() -> &'static Regex {
        static LEADING_NUMBER: OnceLock<Regex> = OnceLock::new();
        LEADING_NUMBER.get_or_init(|| {
            Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("regex is valid")
        })
    }

    fn strip_separators(raw: &str) -> String {
        raw.trim()
            .chars()
            .filter(|c| *c != Self::THOUSANDS_SEPARATOR)
            .collect()
    }

    /// Parse the leading number of `raw`.
    ///
    /// * `""`, `"-"` and whitespace-only input → `None`
    /// * `"1,234"` → `Some(1234.0)`
    /// * `"60 min"`, `"1,234.5 approx"` → `Some(60.0)`, `Some(1234.5)`
    /// * `"NaN"`, `"inf"`, `"about forty"` → `None`
    pub fn parse(raw: &str) -> Option<f64> {
        let cleaned = Self::strip_separators(raw);
        let number = Self::leading_number().find(&cleaned)?;
        number.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Like [`NumericParser::parse`], but the whole cell must be the number.
    /// `"60 min"` and `"2024-01-15"` are text here.
    pub fn parse_exact(raw: &str) -> Option<f64> {
        let cleaned = Self::strip_separators(raw);
        let number = Self::leading_number().find(&cleaned)?;
        if number.end() != cleaned.len() {
            return None;
        }
        number.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    /// Parse `raw`, defaulting to `0.0` whenever [`NumericParser::parse`] fails.
    pub fn coerce(raw: &str) -> f64 {
        Self::parse(raw).unwrap_or(0.0)
    }
}

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses the date column, which different sheets fill in different styles.
pub struct DateParser;

impl DateParser {
    /// Date-only patterns, tried in order. US month-first is tried before
    /// day-first so `"1/2/2024"` reads as January 2nd.
    const DATE_FORMATS: &'static [&'static str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%Y/%m/%d",
        "%d %b %Y",
        "%d %B %Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%A, %B %d, %Y",
    ];

    /// Date-time patterns whose date part is kept.
    const DATETIME_FORMATS: &'static [&'static str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];

    /// Parse a date cell, returning `None` when no known pattern matches.
    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        for fmt in Self::DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Some(date);
            }
        }

        for fmt in Self::DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.date());
            }
        }

        debug!("DateParser: could not parse date \"{}\"", s);
        None
    }

    /// Month number (1-12) of a date cell, if it parses.
    pub fn month(raw: &str) -> Option<u32> {
        Self::parse(raw).map(|d| d.month())
    }
}

/// English month name for `month` (1-12); `None` outside that range.
pub fn month_name(month: u32) -> Option<&'static str> {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    month
        .checked_sub(1)
        .and_then(|i| NAMES.get(i as usize))
        .copied()
}

// ── Tests ──────────────────────────────────────────────────────────────────────
