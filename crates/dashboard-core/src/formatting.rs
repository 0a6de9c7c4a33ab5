use crate::models::FieldValue;

/// Format a number with thousands separators and `decimals` fractional digits.
///
/// # Examples
///
/// ```
/// use dashboard_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = format!("{:.prec$}", value.abs(), prec = decimals as usize);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::new();
    if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a count such as attendance: integral values without decimals,
/// anything else with one decimal place.
pub fn format_count(value: f64) -> String {
    if value.fract() == 0.0 {
        format_number(value, 0)
    } else {
        format_number(value, 1)
    }
}

/// Format a duration in minutes as `"45m"`, `"3h"` or `"3h 45m"`.
///
/// ```
/// use dashboard_core::formatting::format_duration_minutes;
///
/// assert_eq!(format_duration_minutes(45.0), "45m");
/// assert_eq!(format_duration_minutes(225.0), "3h 45m");
/// ```
pub fn format_duration_minutes(minutes: f64) -> String {
    let total = minutes.max(0.0).round() as i64;
    match (total / 60, total % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// Render a cell for display. Numbers get thousands separators; text is
/// shown as stored, including numeric-field cells that did not parse.
pub fn format_cell(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format_count(*n),
        FieldValue::Text(s) => s.clone(),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
