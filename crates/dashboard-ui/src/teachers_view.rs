//! Teacher leaderboard and profile view.
//!
//! The left column shows the top-N boards for every [`Metric`] above a
//! scrollable picker of group names; the right column shows the profile of
//! the highlighted group with its class history, or a side-by-side table
//! when a comparison set is active.

use std::collections::BTreeSet;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use dashboard_core::formatting;
use dashboard_core::models::keys;
use dashboard_data::aggregator::{GroupStats, GroupedStats, Leaderboard, Metric};

use crate::table_view::{column_label, truncate_to_width};
use crate::themes::Theme;

/// Classes listed in a profile before the rest are summarised.
const MAX_HISTORY_ROWS: usize = 50;

pub struct TeachersViewData<'g, 'a> {
    pub grouped: &'g GroupedStats<'a>,
    pub leaderboard: &'g Leaderboard,
    /// Group names in picker order.
    pub names: &'g [String],
    /// Index into `names` of the highlighted group.
    pub cursor: usize,
    /// Groups picked for comparison; `None` shows the single profile.
    pub compared: Option<&'g BTreeSet<String>>,
}

/// `"12"`, `"1,234.5"` or `"3h 45m"` depending on the metric.
pub fn format_metric(metric: Metric, value: f64) -> String {
    match metric {
        Metric::TotalDuration => formatting::format_duration_minutes(value),
        _ => formatting::format_count(value),
    }
}

// ── Line builders ─────────────────────────────────────────────────────────────

pub fn build_leaderboard_lines<'a>(leaderboard: &Leaderboard, theme: &'a Theme) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    for (metric, entries) in &leaderboard.boards {
        lines.push(Line::from(Span::styled(metric.title(), theme.bold)));
        if entries.is_empty() {
            lines.push(Line::from(Span::styled("  no data", theme.dim)));
        }
        for (i, entry) in entries.iter().enumerate() {
            let rank = i + 1;
            lines.push(Line::from(vec![
                Span::styled(format!("  {}. ", rank), theme.rank_style(rank)),
                Span::styled(entry.name.clone(), theme.rank_style(rank)),
                Span::styled("  ", theme.dim),
                Span::styled(format_metric(*metric, entry.value), theme.value),
            ]));
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Group names, with a checkbox per name while comparing.
pub fn build_picker_lines<'a>(
    names: &[String],
    cursor: usize,
    compared: Option<&BTreeSet<String>>,
    theme: &'a Theme,
) -> Vec<Line<'a>> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let style = if i == cursor { theme.selected } else { theme.text };
            let label = match compared {
                Some(set) if set.contains(name) => format!("[x] {}", name),
                Some(_) => format!("[ ] {}", name),
                None => name.clone(),
            };
            Line::from(Span::styled(label, style))
        })
        .collect()
}

/// One row per compared group, in name order. Names no longer present in
/// `grouped` are skipped.
pub fn build_comparison_lines<'a>(
    grouped: &GroupedStats<'_>,
    compared: &BTreeSet<String>,
    theme: &'a Theme,
) -> Vec<Line<'a>> {
    if compared.is_empty() {
        return vec![
            Line::from(Span::styled("Nothing selected", theme.warning)),
            Line::from(Span::styled(
                "Press Space on a name to add it, x to leave comparison.",
                theme.dim,
            )),
        ];
    }

    let mut lines = vec![Line::from(Span::styled(
        format!(
            "{:<20} {:>8} {:>10} {:>8} {:>10}",
            column_label(&grouped.field),
            "Classes",
            "Avg.",
            "Peak",
            "Time"
        ),
        theme.table_header,
    ))];
    let rows = compared.iter().filter_map(|name| grouped.get(name));
    for (i, stats) in rows.enumerate() {
        lines.push(Line::from(Span::styled(
            format!(
                "{:<20} {:>8} {:>10} {:>8} {:>10}",
                truncate_to_width(&stats.name, 20),
                stats.class_count,
                formatting::format_count(stats.avg_attendance),
                formatting::format_count(stats.highest_peak_attendance),
                formatting::format_duration_minutes(stats.total_duration_minutes),
            ),
            theme.row_style(i),
        )));
    }
    lines
}

fn stat_line<'a>(label: &str, value: String, theme: &'a Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<22}", label), theme.label),
        Span::styled(value, theme.value),
    ])
}

/// Summary block followed by the class history, newest first.
pub fn build_profile_lines<'a>(stats: &GroupStats<'_>, theme: &'a Theme) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::from(Span::styled(stats.name.clone(), theme.header)),
        Line::from(""),
        stat_line("Classes", stats.class_count.to_string(), theme),
        stat_line(
            "Avg. attendance",
            formatting::format_count(stats.avg_attendance),
            theme,
        ),
        stat_line(
            "Peak attendance",
            formatting::format_count(stats.highest_peak_attendance),
            theme,
        ),
        stat_line(
            "Teaching time",
            formatting::format_duration_minutes(stats.total_duration_minutes),
            theme,
        ),
    ];

    if let Some(witness) = stats.highest_attendance_class {
        lines.push(stat_line(
            "Best class",
            format!(
                "{} · {}",
                witness.text_ref(keys::DATE),
                witness.text_ref(keys::TOPIC)
            ),
            theme,
        ));
    }
    if !stats.unique_product_types.is_empty() {
        lines.push(stat_line(
            "Product types",
            stats.unique_product_types.join(", "),
            theme,
        ));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Courses", theme.bold)));
    if stats.course_breakdown.is_empty() {
        lines.push(Line::from(Span::styled("  none recorded", theme.dim)));
    }
    for (course, count) in &stats.course_breakdown {
        lines.push(Line::from(vec![
            Span::styled(format!("  {}", course), theme.text),
            Span::styled(format!("  ×{}", count), theme.dim),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!(
            "{:<12} {:<18} {:<28} {:>8}",
            column_label(keys::DATE),
            column_label(keys::COURSE),
            column_label(keys::TOPIC),
            "Peak"
        ),
        theme.table_header,
    )));
    for (i, class) in stats.classes.iter().take(MAX_HISTORY_ROWS).enumerate() {
        lines.push(Line::from(Span::styled(
            format!(
                "{:<12} {:<18} {:<28} {:>8}",
                truncate_to_width(class.text_ref(keys::DATE), 12),
                truncate_to_width(class.text_ref(keys::COURSE), 18),
                truncate_to_width(class.text_ref(keys::TOPIC), 28),
                formatting::format_count(class.number(keys::HIGHEST_ATTENDANCE)),
            ),
            theme.row_style(i),
        )));
    }
    if stats.classes.len() > MAX_HISTORY_ROWS {
        lines.push(Line::from(Span::styled(
            format!("… {} more", stats.classes.len() - MAX_HISTORY_ROWS),
            theme.dim,
        )));
    }
    lines
}

// ── Render ────────────────────────────────────────────────────────────────────

pub fn render_teachers_view(
    frame: &mut Frame,
    area: Rect,
    data: &TeachersViewData,
    theme: &Theme,
) {
    let [left, right] =
        Layout::horizontal([Constraint::Percentage(38), Constraint::Percentage(62)]).areas(area);
    let [board_area, picker_area] =
        Layout::vertical([Constraint::Min(8), Constraint::Percentage(40)]).areas(left);

    let field_label = column_label(&data.grouped.field).to_string();
    let block = |title: String| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.table_border)
            .title(title)
    };

    frame.render_widget(
        Paragraph::new(Text::from(build_leaderboard_lines(data.leaderboard, theme)))
            .block(block(format!(" Top {} ", field_label))),
        board_area,
    );

    let visible_rows = picker_area.height.saturating_sub(2) as usize;
    let offset = data.cursor.saturating_sub(visible_rows.saturating_sub(1)) as u16;
    frame.render_widget(
        Paragraph::new(Text::from(build_picker_lines(
            data.names,
            data.cursor,
            data.compared,
            theme,
        )))
            .scroll((offset, 0))
            .block(block(format!(" {} ({}) ", field_label, data.names.len()))),
        picker_area,
    );

    if let Some(compared) = data.compared {
        frame.render_widget(
            Paragraph::new(Text::from(build_comparison_lines(data.grouped, compared, theme)))
                .block(block(format!(" Compare ({}) ", compared.len()))),
            right,
        );
        return;
    }

    let profile = data
        .names
        .get(data.cursor)
        .and_then(|name| data.grouped.get(name));
    let profile_lines = match profile {
        Some(stats) => build_profile_lines(stats, theme),
        None => vec![Line::from(Span::styled("No groups to show", theme.warning))],
    };
    frame.render_widget(
        Paragraph::new(Text::from(profile_lines)).block(block(" Profile ".to_string())),
        right,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
