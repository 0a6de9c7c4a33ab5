//! Record table view for the class dashboard.
//!
//! Renders the filtered, sorted records as a bordered
//! [`ratatui::widgets::Table`] under a one-line filter bar, plus the column
//! picker overlay used to toggle column visibility.

use std::collections::BTreeSet;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use dashboard_core::formatting;
use dashboard_core::models::{field_def, Record, FIELDS};
use dashboard_data::query::{SortDirection, SortState};

use crate::themes::Theme;

/// Narrowest and widest a data column may be drawn.
const MIN_COLUMN_WIDTH: usize = 6;
const MAX_COLUMN_WIDTH: usize = 28;

/// Everything the table needs for one frame.
#[derive(Debug, Clone)]
pub struct TableViewData<'a> {
    /// Visible column keys, already in display order.
    pub columns: Vec<String>,
    pub rows: Vec<&'a Record>,
    pub sort: Option<&'a SortState>,
    /// Index into `columns` of the highlighted header cell.
    pub column_cursor: usize,
    /// Index into `rows` of the highlighted row.
    pub row_cursor: usize,
    pub search: &'a str,
    /// Whether the search prompt has keyboard focus.
    pub search_active: bool,
    /// Current product-type filter label ("all" when unrestricted).
    pub product_filter: &'a str,
    /// Current month filter label, if any.
    pub month_filter: Option<String>,
    /// Groups being compared, `Some("none")` for an empty comparison set.
    pub group_filter: Option<String>,
}

// ── Cell helpers ──────────────────────────────────────────────────────────────

/// Registry label for `key`, or the key itself for unmapped columns.
pub fn column_label(key: &str) -> &str {
    field_def(key).map(|d| d.label).unwrap_or(key)
}

/// Header text with a sort arrow when `key` is the sort column.
pub fn header_label(key: &str, sort: Option<&SortState>) -> String {
    match sort {
        Some(s) if s.key == key => {
            let arrow = match s.direction {
                SortDirection::Ascending => "▲",
                SortDirection::Descending => "▼",
            };
            format!("{} {}", column_label(key), arrow)
        }
        _ => column_label(key).to_string(),
    }
}

/// Cut `s` to at most `max` terminal columns, ending in `…` when shortened.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Display text for one cell. Newlines are flattened so rows stay one line.
pub fn cell_text(record: &Record, key: &str) -> String {
    record
        .get(key)
        .map(formatting::format_cell)
        .unwrap_or_default()
        .replace(['\n', '\r'], " ")
}

/// Width for `key`: the wider of the header and the widest cell, clamped.
pub fn column_width(key: &str, rows: &[&Record], sort: Option<&SortState>) -> u16 {
    let widest_cell = rows
        .iter()
        .map(|r| cell_text(r, key).width())
        .max()
        .unwrap_or(0);
    let w = header_label(key, sort).width().max(widest_cell);
    w.clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH) as u16
}

// ── Filter bar ────────────────────────────────────────────────────────────────

pub fn build_filter_line<'a>(data: &TableViewData<'a>, theme: &'a Theme) -> Line<'a> {
    let search_style = if data.search_active {
        theme.input_active
    } else {
        theme.value
    };
    let cursor = if data.search_active { "▏" } else { "" };

    let mut spans = vec![
        Span::styled("🔍 ", theme.label),
        Span::styled(format!("{}{}", data.search, cursor), search_style),
        Span::styled("   Product: ", theme.label),
        Span::styled(data.product_filter.to_string(), theme.value),
    ];
    if let Some(month) = &data.month_filter {
        spans.push(Span::styled("   Month: ", theme.label));
        spans.push(Span::styled(month.clone(), theme.value));
    }
    if let Some(groups) = &data.group_filter {
        spans.push(Span::styled("   Compare: ", theme.label));
        spans.push(Span::styled(groups.clone(), theme.value));
    }
    Line::from(spans)
}

// ── Render ────────────────────────────────────────────────────────────────────

/// Render the filter bar and the record table into `area`.
pub fn render_table_view(frame: &mut Frame, area: Rect, data: &TableViewData, theme: &Theme) {
    let [filter_area, table_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(3)]).areas(area);

    frame.render_widget(Paragraph::new(build_filter_line(data, theme)), filter_area);

    if data.columns.is_empty() {
        render_no_data(frame, table_area, "No columns visible", "Press 'c' to choose columns.", theme);
        return;
    }
    if data.rows.is_empty() {
        render_no_data(frame, table_area, "No matching classes", "Press Esc to clear filters.", theme);
        return;
    }

    let header_cells = data.columns.iter().enumerate().map(|(i, key)| {
        let style = if i == data.column_cursor {
            theme.table_header_active
        } else {
            theme.table_header
        };
        Cell::from(header_label(key, data.sort)).style(style)
    });
    let header = Row::new(header_cells).height(1);

    let widths: Vec<Constraint> = data
        .columns
        .iter()
        .map(|key| Constraint::Length(column_width(key, &data.rows, data.sort)))
        .collect();

    let rows: Vec<Row> = data
        .rows
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let cells = data
                .columns
                .iter()
                .map(|key| Cell::from(truncate_to_width(&cell_text(record, key), MAX_COLUMN_WIDTH)));
            Row::new(cells).style(theme.row_style(i))
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(format!(" Classes ({}) ", data.rows.len())),
        )
        .row_highlight_style(theme.selected)
        .style(theme.text);

    let mut state = TableState::default().with_selected(Some(data.row_cursor.min(data.rows.len() - 1)));
    frame.render_stateful_widget(table, table_area, &mut state);
}

/// Checkbox list of every registry field for toggling visibility.
pub fn build_column_picker_lines<'a>(
    visible: &BTreeSet<String>,
    cursor: usize,
    theme: &'a Theme,
) -> Vec<Line<'a>> {
    FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let mark = if visible.contains(field.key) { "[x]" } else { "[ ]" };
            let style = if i == cursor { theme.selected } else { theme.text };
            Line::from(Span::styled(format!("{} {}", mark, field.label), style))
        })
        .collect()
}

/// Column picker drawn as a centred overlay on top of `area`.
pub fn render_column_picker(
    frame: &mut Frame,
    area: Rect,
    visible: &BTreeSet<String>,
    cursor: usize,
    theme: &Theme,
) {
    let width = area.width.min(44);
    let height = area.height.saturating_sub(2).max(3).min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    let inner_rows = height.saturating_sub(2) as usize;
    let offset = cursor.saturating_sub(inner_rows.saturating_sub(1)) as u16;

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(Text::from(build_column_picker_lines(visible, cursor, theme)))
            .scroll((offset, 0))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.table_border)
                    .title(" Columns · Space toggles · Esc closes "),
            ),
        popup,
    );
}

/// Placeholder shown when there is nothing to put in the table.
pub fn render_no_data(frame: &mut Frame, area: Rect, message: &str, hint: &str, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(message.to_string(), theme.warning)),
        Line::from(""),
        Line::from(Span::styled(hint.to_string(), theme.dim)),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.table_border)
                .title(" Class Dashboard "),
        ),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
