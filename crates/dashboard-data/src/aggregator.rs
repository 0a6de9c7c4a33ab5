//! Per-group statistics and top-N rankings over a record set.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use dashboard_core::data_processors::DateParser;
use dashboard_core::models::{keys, Record};
use serde::Serialize;

/// Entries per leaderboard when the caller does not choose.
pub const DEFAULT_TOP_N: usize = 3;

// ── GroupStats ────────────────────────────────────────────────────────────────

/// Statistics for every record sharing one grouping value.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats<'a> {
    /// The grouping value, e.g. a teacher name.
    pub name: String,
    pub class_count: usize,
    pub total_duration_minutes: f64,
    pub total_average_attendance: f64,
    /// `round(total_average_attendance / class_count)`; 0 for an empty group.
    pub avg_attendance: f64,
    pub highest_peak_attendance: f64,
    /// First record reaching `highest_peak_attendance`.
    pub highest_attendance_class: Option<&'a Record>,
    /// Classes per non-empty course.
    pub course_breakdown: BTreeMap<String, usize>,
    /// Distinct non-empty courses, first-occurrence order.
    pub unique_courses: Vec<String>,
    /// Distinct non-empty product types, first-occurrence order.
    pub unique_product_types: Vec<String>,
    /// The group's records, newest date first; unparseable dates last.
    pub classes: Vec<&'a Record>,
}

impl<'a> GroupStats<'a> {
    fn from_records(name: String, members: Vec<&'a Record>) -> Self {
        let class_count = members.len();
        let mut total_duration_minutes = 0.0;
        let mut total_average_attendance = 0.0;
        let mut highest_peak_attendance = 0.0;
        let mut highest_attendance_class: Option<&Record> = None;
        let mut course_breakdown = BTreeMap::new();

        for record in &members {
            total_duration_minutes += record.number(keys::TOTAL_DURATION_MINUTES);
            total_average_attendance += record.number(keys::AVERAGE_ATTENDANCE);

            let peak = record.number(keys::HIGHEST_ATTENDANCE);
            if highest_attendance_class.is_none() || peak > highest_peak_attendance {
                highest_peak_attendance = peak;
                highest_attendance_class = Some(*record);
            }

            let course = record.text_ref(keys::COURSE);
            if !course.is_empty() {
                *course_breakdown.entry(course.to_string()).or_insert(0) += 1;
            }
        }

        let avg_attendance = if class_count == 0 {
            0.0
        } else {
            (total_average_attendance / class_count as f64).round()
        };

        let mut classes = members.clone();
        classes.sort_by(|a, b| compare_dates_desc(a, b));

        Self {
            name,
            class_count,
            total_duration_minutes,
            total_average_attendance,
            avg_attendance,
            highest_peak_attendance,
            highest_attendance_class,
            course_breakdown,
            unique_courses: unique_non_empty(&members, keys::COURSE),
            unique_product_types: unique_non_empty(&members, keys::PRODUCT_TYPE),
            classes,
        }
    }

    /// Value used for ranking by `metric`.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::ClassCount => self.class_count as f64,
            Metric::AvgAttendance => self.avg_attendance,
            Metric::HighestPeakAttendance => self.highest_peak_attendance,
            Metric::TotalDuration => self.total_duration_minutes,
        }
    }
}

fn unique_non_empty(records: &[&Record], field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.text_ref(field))
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .map(str::to_string)
        .collect()
}

fn compare_dates_desc(a: &Record, b: &Record) -> Ordering {
    let da = DateParser::parse(a.text_ref(keys::DATE));
    let db = DateParser::parse(b.text_ref(keys::DATE));
    match (da, db) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ── GroupedStats ──────────────────────────────────────────────────────────────

/// All groups for one grouping field, in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct GroupedStats<'a> {
    pub field: String,
    groups: Vec<GroupStats<'a>>,
    index: HashMap<String, usize>,
}

impl<'a> GroupedStats<'a> {
    pub fn groups(&self) -> &[GroupStats<'a>] {
        &self.groups
    }

    pub fn get(&self, name: &str) -> Option<&GroupStats<'a>> {
        self.index.get(name).map(|&i| &self.groups[i])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group names in case-insensitive alphabetical order, for pickers.
    pub fn names_sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|g| g.name.clone()).collect();
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        names
    }

    /// Sum of `class_count` over all groups.
    pub fn total_class_count(&self) -> usize {
        self.groups.iter().map(|g| g.class_count).sum()
    }
}

// ── Metrics and leaderboards ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ClassCount,
    AvgAttendance,
    HighestPeakAttendance,
    TotalDuration,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::ClassCount,
        Metric::AvgAttendance,
        Metric::HighestPeakAttendance,
        Metric::TotalDuration,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Metric::ClassCount => "Most Classes",
            Metric::AvgAttendance => "Highest Avg. Attendance",
            Metric::HighestPeakAttendance => "Highest Peak Attendance",
            Metric::TotalDuration => "Most Teaching Time",
        }
    }
}

/// One ranked row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub value: f64,
}

/// Top-N tables for every [`Metric`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub field: String,
    pub boards: Vec<(Metric, Vec<LeaderboardEntry>)>,
}

impl Leaderboard {
    pub fn board(&self, metric: Metric) -> &[LeaderboardEntry] {
        self.boards
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }
}

// ── GroupAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that groups records and ranks the groups.
pub struct GroupAggregator;

impl GroupAggregator {
    /// Group `records` by the text of `field`. Records with an empty value
    /// belong to no group.
    pub fn aggregate<'a>(records: &'a [Record], field: &str) -> GroupedStats<'a> {
        let mut order: Vec<String> = Vec::new();
        let mut members: HashMap<String, Vec<&'a Record>> = HashMap::new();

        for record in records {
            let value = record.text(field);
            if value.is_empty() {
                continue;
            }
            members
                .entry(value.clone())
                .or_insert_with(|| {
                    order.push(value.clone());
                    Vec::new()
                })
                .push(record);
        }

        let mut grouped = GroupedStats {
            field: field.to_string(),
            ..Default::default()
        };
        for name in order {
            let group_records = members.remove(&name).unwrap_or_default();
            grouped.index.insert(name.clone(), grouped.groups.len());
            grouped
                .groups
                .push(GroupStats::from_records(name, group_records));
        }
        grouped
    }

    /// The `n` best groups by `metric`, descending; ties keep group order.
    pub fn top_n<'g, 'a>(
        grouped: &'g GroupedStats<'a>,
        metric: Metric,
        n: usize,
    ) -> Vec<&'g GroupStats<'a>> {
        let mut ranked: Vec<&GroupStats<'a>> = grouped.groups.iter().collect();
        ranked.sort_by(|a, b| b.metric(metric).total_cmp(&a.metric(metric)));
        ranked.truncate(n);
        ranked
    }

    /// [`GroupAggregator::top_n`] for every metric.
    pub fn leaderboard(grouped: &GroupedStats<'_>, n: usize) -> Leaderboard {
        let boards = Metric::ALL
            .iter()
            .map(|&metric| {
                let entries = Self::top_n(grouped, metric, n)
                    .into_iter()
                    .map(|g| LeaderboardEntry {
                        name: g.name.clone(),
                        value: g.metric(metric),
                    })
                    .collect();
                (metric, entries)
            })
            .collect();
        Leaderboard {
            field: grouped.field.clone(),
            boards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ImportPipeline;

    fn record(id: usize, pairs: &[(&str, &str)]) -> Record {
        let mut r = Record::new(Record::row_id(id), Default::default());
        for (k, v) in pairs {
            r = r.with_field(k, v);
        }
        r
    }

    fn class(id: usize, teacher: &str, date: &str, avg: &str, peak: &str, mins: &str) -> Record {
        record(
            id,
            &[
                (keys::TEACHER, teacher),
                (keys::DATE, date),
                (keys::AVERAGE_ATTENDANCE, avg),
                (keys::HIGHEST_ATTENDANCE, peak),
                (keys::TOTAL_DURATION_MINUTES, mins),
            ],
        )
    }

    // ── aggregate ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_end_to_end_grid_groups_by_teacher() {
        let rows: Vec<Vec<String>> = [
            ["Date", "Teacher"],
            ["2024-01-01", "Alice"],
            ["2024-01-02", "Alice"],
        ]
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
        let set = ImportPipeline::default().import(&rows).await.unwrap();

        let grouped = GroupAggregator::aggregate(&set.records, keys::TEACHER);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.get("Alice").unwrap().class_count, 2);
    }

    #[test]
    fn test_sum_of_class_counts_equals_non_empty_records() {
        let records = vec![
            class(0, "Alice", "2024-01-01", "10", "20", "60"),
            class(1, "", "2024-01-02", "10", "20", "60"),
            class(2, "Bob", "2024-01-03", "10", "20", "60"),
            class(3, "Alice", "2024-01-04", "10", "20", "60"),
            class(4, "Carol", "", "", "", ""),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let non_empty = records
            .iter()
            .filter(|r| !r.text(keys::TEACHER).is_empty())
            .count();
        assert_eq!(grouped.total_class_count(), non_empty);
        let names: Vec<&str> = grouped.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_avg_attendance_is_rounded_mean() {
        let records = vec![
            class(0, "Alice", "2024-01-01", "10", "0", "60"),
            class(1, "Alice", "2024-01-02", "11", "0", "30"),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let alice = grouped.get("Alice").unwrap();
        assert_eq!(alice.total_average_attendance, 21.0);
        assert_eq!(alice.avg_attendance, 11.0);
        assert_eq!(alice.total_duration_minutes, 90.0);
    }

    #[test]
    fn test_witness_is_first_record_with_max() {
        let records = vec![
            class(0, "Alice", "2024-01-01", "0", "50", "0"),
            class(1, "Alice", "2024-01-02", "0", "90", "0"),
            class(2, "Alice", "2024-01-03", "0", "90", "0"),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let alice = grouped.get("Alice").unwrap();
        assert_eq!(alice.highest_peak_attendance, 90.0);
        assert_eq!(alice.highest_attendance_class.unwrap().id, "row-1");
    }

    #[test]
    fn test_witness_when_all_peaks_zero() {
        let records = vec![
            class(0, "Bob", "2024-01-01", "", "", ""),
            class(1, "Bob", "2024-01-02", "", "-", ""),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let bob = grouped.get("Bob").unwrap();
        assert_eq!(bob.highest_peak_attendance, 0.0);
        assert_eq!(bob.highest_attendance_class.unwrap().id, "row-0");
    }

    #[test]
    fn test_breakdowns_exclude_empty_values() {
        let records = vec![
            record(0, &[(keys::TEACHER, "Alice"), (keys::COURSE, "HSC"), (keys::PRODUCT_TYPE, "Live")]),
            record(1, &[(keys::TEACHER, "Alice"), (keys::COURSE, "Admission"), (keys::PRODUCT_TYPE, "")]),
            record(2, &[(keys::TEACHER, "Alice"), (keys::COURSE, "HSC"), (keys::PRODUCT_TYPE, "Recorded")]),
            record(3, &[(keys::TEACHER, "Alice"), (keys::COURSE, ""), (keys::PRODUCT_TYPE, "Live")]),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let alice = grouped.get("Alice").unwrap();

        let breakdown: Vec<(&str, usize)> = alice
            .course_breakdown
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(breakdown, vec![("Admission", 1), ("HSC", 2)]);
        assert_eq!(alice.unique_courses, vec!["HSC", "Admission"]);
        assert_eq!(alice.unique_product_types, vec!["Live", "Recorded"]);
    }

    #[test]
    fn test_classes_sorted_newest_first_with_unparseable_last() {
        let records = vec![
            class(0, "Alice", "2024-01-05", "", "", ""),
            class(1, "Alice", "someday", "", "", ""),
            class(2, "Alice", "2024-03-01", "", "", ""),
            class(3, "Alice", "", "", "", ""),
            class(4, "Alice", "2/1/2024", "", "", ""),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let ids: Vec<&str> = grouped
            .get("Alice")
            .unwrap()
            .classes
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["row-2", "row-4", "row-0", "row-1", "row-3"]);
    }

    #[test]
    fn test_group_by_other_field() {
        let records = vec![
            record(0, &[(keys::COURSE, "HSC"), (keys::TEACHER, "Alice")]),
            record(1, &[(keys::COURSE, "HSC"), (keys::TEACHER, "Bob")]),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::COURSE);
        assert_eq!(grouped.field, keys::COURSE);
        assert_eq!(grouped.get("HSC").unwrap().class_count, 2);
    }

    #[test]
    fn test_names_sorted_case_insensitive() {
        let records = vec![
            record(0, &[(keys::TEACHER, "carol")]),
            record(1, &[(keys::TEACHER, "Bob")]),
            record(2, &[(keys::TEACHER, "alice")]),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        assert_eq!(grouped.names_sorted(), vec!["alice", "Bob", "carol"]);
    }

    #[test]
    fn test_empty_input() {
        let grouped = GroupAggregator::aggregate(&[], keys::TEACHER);
        assert!(grouped.is_empty());
        assert!(grouped.get("anyone").is_none());
        assert!(GroupAggregator::top_n(&grouped, Metric::ClassCount, 3).is_empty());
    }

    // ── top_n / leaderboard ──────────────────────────────────────────────────

    #[test]
    fn test_top_n_descending_and_stable() {
        let records = vec![
            class(0, "Alice", "2024-01-01", "100", "0", "0"),
            class(1, "Bob", "2024-01-01", "300", "0", "0"),
            class(2, "Carol", "2024-01-01", "100", "0", "0"),
            class(3, "Dan", "2024-01-01", "50", "0", "0"),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let top: Vec<&str> = GroupAggregator::top_n(&grouped, Metric::AvgAttendance, 3)
            .iter()
            .map(|g| g.name.as_str())
            .collect();
        assert_eq!(top, vec!["Bob", "Alice", "Carol"]);
    }

    #[test]
    fn test_top_n_larger_than_group_count() {
        let records = vec![class(0, "Alice", "2024-01-01", "1", "1", "1")];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        assert_eq!(GroupAggregator::top_n(&grouped, Metric::TotalDuration, 10).len(), 1);
    }

    #[test]
    fn test_leaderboard_covers_every_metric() {
        let records = vec![
            class(0, "Alice", "2024-01-01", "100", "500", "60"),
            class(1, "Alice", "2024-01-02", "100", "200", "60"),
            class(2, "Bob", "2024-01-01", "400", "450", "200"),
        ];
        let grouped = GroupAggregator::aggregate(&records, keys::TEACHER);
        let board = GroupAggregator::leaderboard(&grouped, DEFAULT_TOP_N);

        assert_eq!(board.boards.len(), 4);
        assert_eq!(board.board(Metric::ClassCount)[0].name, "Alice");
        assert_eq!(board.board(Metric::ClassCount)[0].value, 2.0);
        assert_eq!(board.board(Metric::AvgAttendance)[0].name, "Bob");
        assert_eq!(board.board(Metric::HighestPeakAttendance)[0].name, "Alice");
        assert_eq!(board.board(Metric::TotalDuration)[0].name, "Bob");
    }
}
