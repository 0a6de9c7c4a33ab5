use crate::themes::Theme;
use ratatui::text::{Line, Span};

// ── ImportStatus ─────────────────────────────────────────────────────────────

/// Summary of the latest import shown under the header.
///
/// An error from the most recent command wins over the counts, but the
/// counts of the record set still on screen are kept alongside it.
pub struct ImportStatus<'a> {
    /// Records in the current set, `None` before the first import.
    pub records: Option<usize>,
    /// Rows dropped by the enrichment failure policy.
    pub dropped: usize,
    /// Records left after the active filters.
    pub shown: usize,
    /// Successful imports since startup.
    pub import_count: usize,
    pub last_error: Option<&'a str>,
    pub theme: &'a Theme,
}

impl<'a> ImportStatus<'a> {
    pub fn to_line(&self) -> Line<'a> {
        let mut spans = Vec::new();

        match self.records {
            None => spans.push(Span::styled("◌ Waiting for first import", self.theme.dim)),
            Some(total) => {
                spans.push(Span::styled("● ", self.theme.success));
                spans.push(Span::styled(
                    format!("{} of {} records", self.shown, total),
                    self.theme.value,
                ));
                if self.dropped > 0 {
                    spans.push(Span::styled(" · ", self.theme.dim));
                    spans.push(Span::styled(
                        format!("{} dropped", self.dropped),
                        self.theme.warning,
                    ));
                }
                spans.push(Span::styled(" · ", self.theme.dim));
                spans.push(Span::styled(
                    format!("import #{}", self.import_count),
                    self.theme.label,
                ));
            }
        }

        if let Some(error) = self.last_error {
            spans.push(Span::styled("  ✖ ", self.theme.error));
            spans.push(Span::styled(error.to_string(), self.theme.error));
        }

        Line::from(spans)
    }
}

// ── KeyHints ─────────────────────────────────────────────────────────────────

/// A footer line of `key action` pairs.
pub struct KeyHints<'a> {
    pub hints: &'a [(&'a str, &'a str)],
    pub theme: &'a Theme,
}

impl<'a> KeyHints<'a> {
    pub fn to_line(&self) -> Line<'a> {
        let mut spans = Vec::with_capacity(self.hints.len() * 3);
        for (i, (key, action)) in self.hints.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled("  ", self.theme.key_hint));
            }
            spans.push(Span::styled(*key, self.theme.label));
            spans.push(Span::styled(format!(" {}", action), self.theme.key_hint));
        }
        Line::from(spans)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn status<'a>(theme: &'a Theme) -> ImportStatus<'a> {
        ImportStatus {
            records: Some(12),
            dropped: 0,
            shown: 5,
            import_count: 2,
            last_error: None,
            theme,
        }
    }

    #[test]
    fn test_status_before_first_import() {
        let theme = Theme::dark();
        let line = ImportStatus {
            records: None,
            ..status(&theme)
        }
        .to_line();
        assert!(text(&line).contains("Waiting for first import"));
    }

    #[test]
    fn test_status_counts() {
        let theme = Theme::dark();
        let s = text(&status(&theme).to_line());
        assert!(s.contains("5 of 12 records"), "got: {s}");
        assert!(s.contains("import #2"), "got: {s}");
        assert!(!s.contains("dropped"), "got: {s}");
    }

    #[test]
    fn test_status_shows_dropped_in_warning_style() {
        let theme = Theme::dark();
        let line = ImportStatus {
            dropped: 3,
            ..status(&theme)
        }
        .to_line();
        let dropped = line
            .spans
            .iter()
            .find(|s| s.content.contains("dropped"))
            .expect("dropped span");
        assert_eq!(dropped.content, "3 dropped");
        assert_eq!(dropped.style, theme.warning);
    }

    #[test]
    fn test_status_error_kept_next_to_counts() {
        let theme = Theme::dark();
        let line = ImportStatus {
            last_error: Some("Sheet source unavailable: timeout"),
            ..status(&theme)
        }
        .to_line();
        let s = text(&line);
        assert!(s.contains("5 of 12 records"));
        assert!(s.ends_with("Sheet source unavailable: timeout"));
    }

    #[test]
    fn test_key_hints_layout() {
        let theme = Theme::classic();
        let line = KeyHints {
            hints: &[("q", "quit"), ("/", "search")],
            theme: &theme,
        }
        .to_line();
        assert_eq!(text(&line), "q quit  / search");
    }
}
