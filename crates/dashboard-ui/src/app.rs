//! Main application state and TUI event loop for the class dashboard.
//!
//! [`App`] owns the theme, the view and input modes, the explicit
//! [`QueryState`] and the last snapshot received from the runtime. Key
//! handling is a pure state transition ([`App::handle_key`]) that may yield a
//! [`DashboardCommand`] for the runtime; rendering reads the state only.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame, Terminal,
};
use tokio::sync::mpsc;

use dashboard_core::data_processors::month_name;
use dashboard_core::models::{field_def, keys, Record, FIELDS};
use dashboard_data::aggregator::GroupAggregator;
use dashboard_data::query::{self, GroupSelection, MonthRange, QueryState, Selection};
use dashboard_runtime::orchestrator::{DashboardCommand, DashboardData};

use crate::components::header::Header;
use crate::components::status::{ImportStatus, KeyHints};
use crate::table_view::{self, TableViewData};
use crate::teachers_view::{self, TeachersViewData};
use crate::themes::Theme;

// ── Modes ─────────────────────────────────────────────────────────────────────

/// Which view the TUI is currently rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Filterable record table.
    Table,
    /// Leaderboards and per-teacher profile.
    Teachers,
}

impl ViewMode {
    /// `"teachers"` selects [`ViewMode::Teachers`]; anything else the table.
    pub fn from_name(name: &str) -> Self {
        match name {
            "teachers" => ViewMode::Teachers,
            _ => ViewMode::Table,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ViewMode::Table => "table",
            ViewMode::Teachers => "teachers",
        }
    }

    fn toggled(self) -> Self {
        match self {
            ViewMode::Table => ViewMode::Teachers,
            ViewMode::Teachers => ViewMode::Table,
        }
    }
}

/// Where key presses go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing into the free-text search.
    Search,
    /// Column visibility picker is open.
    Columns,
    /// Editing one cell of the selected record.
    Edit { record_id: String, key: String },
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Root application state for the dashboard TUI.
pub struct App {
    pub theme: Theme,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    /// Field the teacher view groups by.
    pub group_by: String,
    /// Entries per leaderboard.
    pub top_n: usize,
    pub query: QueryState,
    /// Index into the visible columns of the highlighted header.
    pub column_cursor: usize,
    /// Index into the filtered rows of the highlighted row.
    pub row_cursor: usize,
    /// Index into [`FIELDS`] inside the column picker.
    pub picker_cursor: usize,
    /// Index into the sorted group names.
    pub group_cursor: usize,
    /// Text being typed while editing a cell.
    pub edit_buffer: String,
    /// Set to `true` to break out of the event loop on the next iteration.
    pub should_quit: bool,
    /// Most recent runtime snapshot, `None` until the first one arrives.
    pub last_data: Option<DashboardData>,
}

impl App {
    pub fn new(theme_name: &str, view_mode: ViewMode, group_by: String, top_n: usize) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            view_mode,
            input_mode: InputMode::Normal,
            group_by,
            top_n,
            query: QueryState::default(),
            column_cursor: 0,
            row_cursor: 0,
            picker_cursor: 0,
            group_cursor: 0,
            edit_buffer: String::new(),
            should_quit: false,
            last_data: None,
        }
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the interactive dashboard.
    ///
    /// Uses `crossterm::event::poll` with a 250 ms timeout so that the
    /// terminal event loop stays on the current thread while snapshots
    /// arrive on `rx` and commands go out on `commands`.
    ///
    /// The loop exits on `q` (normal mode), `Ctrl+C`, or when the runtime
    /// closes its channel.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<DashboardData>,
        commands: mpsc::Sender<DashboardCommand>,
    ) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(250);

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }

            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if let Some(command) = self.handle_key(key) {
                            if let Err(e) = commands.try_send(command) {
                                tracing::warn!(error = %e, "dropping dashboard command");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            loop {
                match rx.try_recv() {
                    Ok(data) => self.update_from_snapshot(data),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        self.should_quit = true;
                        break;
                    }
                }
            }

            if self.should_quit {
                break Ok(());
            }
        };

        // Restore terminal state unconditionally.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Store a new snapshot and pull the cursors back inside its bounds.
    pub fn update_from_snapshot(&mut self, data: DashboardData) {
        if let Some(error) = &data.last_error {
            tracing::debug!(error = %error, "snapshot carries an error");
        }
        self.last_data = Some(data);
        self.clamp_cursors();
    }

    // ── Derived state ─────────────────────────────────────────────────────────

    fn records(&self) -> &[Record] {
        self.last_data
            .as_ref()
            .and_then(|d| d.records.as_deref())
            .map(|set| set.records.as_slice())
            .unwrap_or(&[])
    }

    /// Rows after every active filter and the sort.
    pub fn visible_records(&self) -> Vec<&Record> {
        query::apply(self.records(), &self.query)
    }

    pub fn visible_columns(&self) -> Vec<String> {
        query::project_columns(&self.query.visible_columns)
    }

    /// Key under the column cursor, if any column is visible.
    pub fn cursor_column(&self) -> Option<String> {
        self.visible_columns().into_iter().nth(self.column_cursor)
    }

    pub fn group_names(&self) -> Vec<String> {
        GroupAggregator::aggregate(self.records(), &self.group_by).names_sorted()
    }

    fn clamp_cursors(&mut self) {
        let rows = self.visible_records().len();
        let columns = self.visible_columns().len();
        let groups = self.group_names().len();
        self.row_cursor = self.row_cursor.min(rows.saturating_sub(1));
        self.column_cursor = self.column_cursor.min(columns.saturating_sub(1));
        self.group_cursor = self.group_cursor.min(groups.saturating_sub(1));
    }

    // ── Key handling ──────────────────────────────────────────────────────────

    /// Apply one key press. Returns a command when the runtime must act.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<DashboardCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return None;
        }

        let command = match self.input_mode.clone() {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Search => {
                self.handle_search_key(key);
                None
            }
            InputMode::Columns => {
                self.handle_columns_key(key);
                None
            }
            InputMode::Edit { record_id, key: field } => self.handle_edit_key(key, &record_id, &field),
        };
        self.clamp_cursors();
        command
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<DashboardCommand> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => self.should_quit = true,
            KeyCode::Char('r') => return Some(DashboardCommand::Import),
            KeyCode::Tab => self.view_mode = self.view_mode.toggled(),
            KeyCode::Char('/') => self.input_mode = InputMode::Search,
            KeyCode::Esc => self.clear_filters(),
            _ if self.view_mode == ViewMode::Teachers => self.handle_teachers_key(key),
            _ => self.handle_table_key(key),
        }
        None
    }

    fn handle_table_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => self.column_cursor = self.column_cursor.saturating_sub(1),
            KeyCode::Right => self.column_cursor += 1,
            KeyCode::Up => self.row_cursor = self.row_cursor.saturating_sub(1),
            KeyCode::Down => self.row_cursor += 1,
            KeyCode::Char('s') => self.sort_by_cursor_column(),
            KeyCode::Char('p') => self.cycle_product_type(),
            KeyCode::Char('m') => self.cycle_start_month(),
            KeyCode::Char('M') => self.cycle_end_month(),
            KeyCode::Char('c') => self.input_mode = InputMode::Columns,
            KeyCode::Char('e') | KeyCode::Enter => self.begin_edit(),
            _ => {}
        }
    }

    fn handle_teachers_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.group_cursor = self.group_cursor.saturating_sub(1),
            KeyCode::Down => self.group_cursor += 1,
            KeyCode::Char(' ') => self.toggle_group_under_cursor(),
            KeyCode::Char('x') => self.query = self.query.with_group_selection(None),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => {
                let mut search = self.query.search.clone();
                search.push(c);
                self.query = self.query.with_search(search);
                self.row_cursor = 0;
            }
            KeyCode::Backspace => {
                let mut search = self.query.search.clone();
                search.pop();
                self.query = self.query.with_search(search);
            }
            KeyCode::Enter => self.input_mode = InputMode::Normal,
            KeyCode::Esc => {
                self.query = self.query.with_search("");
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
    }

    fn handle_columns_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.picker_cursor = self.picker_cursor.saturating_sub(1),
            KeyCode::Down => {
                self.picker_cursor = (self.picker_cursor + 1).min(FIELDS.len() - 1)
            }
            KeyCode::Char(' ') => {
                let field = FIELDS[self.picker_cursor].key;
                self.query = self.query.with_column_toggled(field);
            }
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('c') => {
                self.input_mode = InputMode::Normal
            }
            _ => {}
        }
    }

    fn handle_edit_key(
        &mut self,
        key: KeyEvent,
        record_id: &str,
        field: &str,
    ) -> Option<DashboardCommand> {
        match key.code {
            KeyCode::Char(c) => self.edit_buffer.push(c),
            KeyCode::Backspace => {
                self.edit_buffer.pop();
            }
            KeyCode::Esc => {
                self.edit_buffer.clear();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                let edited = self
                    .records()
                    .iter()
                    .find(|r| r.id == record_id)
                    .map(|r| r.with_field(field, &self.edit_buffer));
                self.edit_buffer.clear();
                self.input_mode = InputMode::Normal;
                if edited.is_none() {
                    tracing::warn!(record = record_id, "edited record no longer present");
                }
                return edited.map(DashboardCommand::Edit);
            }
            _ => {}
        }
        None
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    fn clear_filters(&mut self) {
        self.query = QueryState {
            sort: self.query.sort.clone(),
            visible_columns: self.query.visible_columns.clone(),
            ..QueryState::default()
        };
        self.row_cursor = 0;
    }

    /// Only registry-sortable columns accept a sort request.
    fn sort_by_cursor_column(&mut self) {
        let Some(column) = self.cursor_column() else {
            return;
        };
        if field_def(&column).is_some_and(|d| d.sortable) {
            self.query = self.query.with_sort_toggled(&column);
        }
    }

    /// Step the product-type filter through `all` and every distinct value.
    fn cycle_product_type(&mut self) {
        let choices = query::distinct_values(self.records(), keys::PRODUCT_TYPE);
        let current = match self.query.selection(keys::PRODUCT_TYPE) {
            Selection::All => query::ALL.to_string(),
            Selection::Value(v) => v.clone(),
        };
        let next = choices
            .iter()
            .position(|c| *c == current)
            .map(|i| (i + 1) % choices.len())
            .unwrap_or(0);
        let choice = choices.get(next).map(String::as_str).unwrap_or(query::ALL);
        self.query = self
            .query
            .with_selection(keys::PRODUCT_TYPE, Selection::from_choice(choice));
        self.row_cursor = 0;
    }

    /// Step the start month forward. Without a range this starts one at
    /// January; stepping past December clears the range.
    fn cycle_start_month(&mut self) {
        let next = match self.query.month_range {
            None => MonthRange::new(1, 1),
            Some(r) if r.start < 12 => MonthRange::new(r.start + 1, r.end),
            Some(_) => None,
        };
        self.query = self.query.with_month_range(next);
        self.row_cursor = 0;
    }

    /// Step the end month forward, same rules as the start month.
    fn cycle_end_month(&mut self) {
        let next = match self.query.month_range {
            None => MonthRange::new(1, 1),
            Some(r) if r.end < 12 => MonthRange::new(r.start, r.end + 1),
            Some(_) => None,
        };
        self.query = self.query.with_month_range(next);
        self.row_cursor = 0;
    }

    /// Add or remove the highlighted group from the comparison set. A set
    /// over another field is replaced.
    fn toggle_group_under_cursor(&mut self) {
        let Some(name) = self.group_names().into_iter().nth(self.group_cursor) else {
            return;
        };
        let mut selection = match &self.query.group_selection {
            Some(sel) if sel.field == self.group_by => sel.clone(),
            _ => GroupSelection {
                field: self.group_by.clone(),
                values: Default::default(),
            },
        };
        if !selection.values.remove(&name) {
            selection.values.insert(name);
        }
        self.query = self.query.with_group_selection(Some(selection));
        self.row_cursor = 0;
    }

    /// Groups in the comparison set, when it is over the grouping field.
    fn compared_groups(&self) -> Option<&std::collections::BTreeSet<String>> {
        self.query
            .group_selection
            .as_ref()
            .filter(|sel| sel.field == self.group_by)
            .map(|sel| &sel.values)
    }

    fn begin_edit(&mut self) {
        let Some(column) = self.cursor_column() else {
            return;
        };
        let Some(record) = self.visible_records().get(self.row_cursor).map(|r| (*r).clone()) else {
            return;
        };
        self.edit_buffer = record.text(&column);
        self.input_mode = InputMode::Edit {
            record_id: record.id,
            key: column,
        };
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn month_label(&self) -> Option<String> {
        self.query.month_range.map(|r| {
            let start = month_name(r.start).unwrap_or("?");
            let end = month_name(r.end).unwrap_or("?");
            format!("{} to {}", start, end)
        })
    }

    fn compare_label(&self) -> Option<String> {
        self.query.group_selection.as_ref().map(|sel| {
            if sel.values.is_empty() {
                "none".to_string()
            } else {
                sel.values.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        })
    }

    fn key_hints(&self) -> &'static [(&'static str, &'static str)] {
        match (&self.input_mode, self.view_mode) {
            (InputMode::Search, _) => &[("Enter", "done"), ("Esc", "clear")],
            (InputMode::Columns, _) => &[("↑↓", "move"), ("Space", "toggle"), ("Esc", "close")],
            (InputMode::Edit { .. }, _) => &[("Enter", "save"), ("Esc", "cancel")],
            (InputMode::Normal, ViewMode::Table) => &[
                ("q", "quit"),
                ("Tab", "teachers"),
                ("/", "search"),
                ("←→", "column"),
                ("s", "sort"),
                ("p", "product"),
                ("m/M", "start/end month"),
                ("c", "columns"),
                ("e", "edit"),
                ("r", "reimport"),
            ],
            (InputMode::Normal, ViewMode::Teachers) => &[
                ("q", "quit"),
                ("Tab", "table"),
                ("↑↓", "select"),
                ("Space", "compare"),
                ("x", "clear compare"),
                ("r", "reimport"),
            ],
        }
    }

    /// Render the current application state into `frame`.
    pub fn render(&self, frame: &mut Frame) {
        let [header_area, status_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let source = self
            .last_data
            .as_ref()
            .map(|d| d.source.as_str())
            .unwrap_or("connecting…");
        let header = Header::new(source, self.view_mode.name(), &self.theme);
        frame.render_widget(Paragraph::new(Text::from(header.to_lines())), header_area);

        let visible = self.visible_records();
        let set = self.last_data.as_ref().and_then(|d| d.records.as_deref());
        let status = ImportStatus {
            records: set.map(|s| s.len()),
            dropped: set.map(|s| s.report.dropped.len()).unwrap_or(0),
            shown: visible.len(),
            import_count: self.last_data.as_ref().map(|d| d.import_count).unwrap_or(0),
            last_error: self.last_data.as_ref().and_then(|d| d.last_error.as_deref()),
            theme: &self.theme,
        };
        frame.render_widget(Paragraph::new(status.to_line()), status_area);

        if set.is_none() {
            let message = if status.last_error.is_some() {
                "Import failed"
            } else {
                "Importing classes…"
            };
            table_view::render_no_data(frame, body_area, message, "Press 'r' to retry.", &self.theme);
        } else {
            match self.view_mode {
                ViewMode::Table => self.render_table(frame, body_area, visible),
                ViewMode::Teachers => self.render_teachers(frame, body_area),
            }
        }

        let footer = match &self.input_mode {
            InputMode::Edit { key, .. } => Line::from(vec![
                Span::styled(format!("Edit {}: ", table_view::column_label(key)), self.theme.label),
                Span::styled(format!("{}▏", self.edit_buffer), self.theme.input_active),
            ]),
            _ => KeyHints {
                hints: self.key_hints(),
                theme: &self.theme,
            }
            .to_line(),
        };
        frame.render_widget(Paragraph::new(footer), footer_area);
    }

    fn render_table(&self, frame: &mut Frame, area: ratatui::layout::Rect, rows: Vec<&Record>) {
        let product = match self.query.selection(keys::PRODUCT_TYPE) {
            Selection::All => query::ALL,
            Selection::Value(v) => v.as_str(),
        };
        let data = TableViewData {
            columns: self.visible_columns(),
            rows,
            sort: self.query.sort.as_ref(),
            column_cursor: self.column_cursor,
            row_cursor: self.row_cursor,
            search: &self.query.search,
            search_active: self.input_mode == InputMode::Search,
            product_filter: product,
            month_filter: self.month_label(),
            group_filter: self.compare_label(),
        };
        table_view::render_table_view(frame, area, &data, &self.theme);

        if self.input_mode == InputMode::Columns {
            table_view::render_column_picker(
                frame,
                area,
                &self.query.visible_columns,
                self.picker_cursor,
                &self.theme,
            );
        }
    }

    fn render_teachers(&self, frame: &mut Frame, area: ratatui::layout::Rect) {
        let grouped = GroupAggregator::aggregate(self.records(), &self.group_by);
        let leaderboard = GroupAggregator::leaderboard(&grouped, self.top_n);
        let names = grouped.names_sorted();
        let data = TeachersViewData {
            grouped: &grouped,
            leaderboard: &leaderboard,
            names: &names,
            cursor: self.group_cursor,
            compared: self.compared_groups(),
        };
        teachers_view::render_teachers_view(frame, area, &data, &self.theme);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_data::pipeline::ImportPipeline;
    use dashboard_data::query::SortDirection;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(press(KeyCode::Char(c)));
        }
    }

    fn grid() -> Vec<Vec<String>> {
        [
            vec!["Date", "Product Type", "Course", "Topic", "Teacher", "Highest Attendance"],
            vec!["2024-01-05", "Premium", "Physics", "Vectors", "Alice", "120"],
            vec!["2024-02-06", "Free", "Maths", "Limits", "Bob", "300"],
            vec!["2024-03-07", "Premium", "Physics", "Optics", "Alice", "80"],
        ]
        .into_iter()
        .map(|r| r.into_iter().map(String::from).collect())
        .collect()
    }

    async fn snapshot() -> DashboardData {
        let set = ImportPipeline::default().import(&grid()).await.unwrap();
        DashboardData {
            records: Some(Arc::new(set)),
            last_error: None,
            import_count: 1,
            source: "test grid".to_string(),
        }
    }

    async fn loaded_app() -> App {
        let mut app = App::new("dark", ViewMode::Table, keys::TEACHER.to_string(), 3);
        app.update_from_snapshot(snapshot().await);
        app
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
        terminal.draw(|frame| app.render(frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    // ── ViewMode ──────────────────────────────────────────────────────────────

    #[test]
    fn test_view_mode_from_name() {
        assert_eq!(ViewMode::from_name("teachers"), ViewMode::Teachers);
        assert_eq!(ViewMode::from_name("table"), ViewMode::Table);
        assert_eq!(ViewMode::from_name("export"), ViewMode::Table);
        assert_eq!(ViewMode::Teachers.name(), "teachers");
    }

    // ── App::new ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_creation_defaults() {
        let app = App::new("dark", ViewMode::Table, "teacher".to_string(), 3);
        assert_eq!(app.view_mode, ViewMode::Table);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.query, QueryState::default());
        assert!(!app.should_quit);
        assert!(app.last_data.is_none());
        assert!(app.visible_records().is_empty());
    }

    // ── Global keys ───────────────────────────────────────────────────────────

    #[test]
    fn test_quit_keys() {
        let mut app = App::new("dark", ViewMode::Table, "teacher".to_string(), 3);
        app.handle_key(press(KeyCode::Char('q')));
        assert!(app.should_quit);

        let mut app = App::new("dark", ViewMode::Table, "teacher".to_string(), 3);
        app.input_mode = InputMode::Search;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_reimport_key_yields_command() {
        let mut app = App::new("dark", ViewMode::Teachers, "teacher".to_string(), 3);
        assert_eq!(
            app.handle_key(press(KeyCode::Char('r'))),
            Some(DashboardCommand::Import)
        );
    }

    #[test]
    fn test_tab_switches_view() {
        let mut app = App::new("dark", ViewMode::Table, "teacher".to_string(), 3);
        app.handle_key(press(KeyCode::Tab));
        assert_eq!(app.view_mode, ViewMode::Teachers);
        app.handle_key(press(KeyCode::Tab));
        assert_eq!(app.view_mode, ViewMode::Table);
    }

    // ── Search ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_search_filters_rows() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Char('/')));
        type_text(&mut app, "OPTIC");
        assert_eq!(app.query.search, "OPTIC");
        // 'q' while searching is text, not quit.
        assert!(!app.should_quit);

        let rows = app.visible_records();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(keys::TOPIC), "Optics");

        app.handle_key(press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.visible_records().len(), 3);
    }

    // ── Sorting and filters ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_sort_toggles_on_cursor_column() {
        let mut app = loaded_app().await;
        let columns = app.visible_columns();
        app.column_cursor = columns
            .iter()
            .position(|c| c == keys::HIGHEST_ATTENDANCE)
            .unwrap();

        app.handle_key(press(KeyCode::Char('s')));
        let peaks: Vec<f64> = app
            .visible_records()
            .iter()
            .map(|r| r.number(keys::HIGHEST_ATTENDANCE))
            .collect();
        assert_eq!(peaks, vec![80.0, 120.0, 300.0]);

        app.handle_key(press(KeyCode::Char('s')));
        assert_eq!(
            app.query.sort.as_ref().unwrap().direction,
            SortDirection::Descending
        );
        assert_eq!(app.visible_records()[0].number(keys::HIGHEST_ATTENDANCE), 300.0);
    }

    #[tokio::test]
    async fn test_sort_ignores_non_sortable_column() {
        let mut app = loaded_app().await;
        app.query = app.query.with_column_toggled(keys::ZOOM_LINK);
        let columns = app.visible_columns();
        app.column_cursor = columns.iter().position(|c| c == keys::ZOOM_LINK).unwrap();

        app.handle_key(press(KeyCode::Char('s')));
        assert!(app.query.sort.is_none());
    }

    #[tokio::test]
    async fn test_product_type_cycles_through_distinct_values() {
        let mut app = loaded_app().await;

        app.handle_key(press(KeyCode::Char('p')));
        assert_eq!(
            app.query.selection(keys::PRODUCT_TYPE),
            &Selection::Value("Premium".to_string())
        );
        assert_eq!(app.visible_records().len(), 2);

        app.handle_key(press(KeyCode::Char('p')));
        assert_eq!(app.visible_records().len(), 1);

        app.handle_key(press(KeyCode::Char('p')));
        assert_eq!(app.query.selection(keys::PRODUCT_TYPE), &Selection::All);
        assert_eq!(app.visible_records().len(), 3);
    }

    #[tokio::test]
    async fn test_start_month_cycle_filters_by_month() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Char('m')));
        assert_eq!(app.query.month_range, MonthRange::new(1, 1));
        assert_eq!(app.visible_records().len(), 1);

        app.query = app.query.with_month_range(MonthRange::new(12, 12));
        app.handle_key(press(KeyCode::Char('m')));
        assert!(app.query.month_range.is_none());
    }

    #[tokio::test]
    async fn test_start_and_end_month_move_independently() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Char('m')));
        app.handle_key(press(KeyCode::Char('M')));
        app.handle_key(press(KeyCode::Char('M')));
        assert_eq!(app.query.month_range, MonthRange::new(1, 3));
        assert_eq!(app.visible_records().len(), 3);

        app.handle_key(press(KeyCode::Char('m')));
        assert_eq!(app.query.month_range, MonthRange::new(2, 3));
        let teachers: Vec<String> = app
            .visible_records()
            .iter()
            .map(|r| r.text(keys::TEACHER))
            .collect();
        assert_eq!(teachers, vec!["Bob", "Alice"]);
        assert!(screen(&app).contains("Month: February to March"));

        app.query = app.query.with_month_range(MonthRange::new(4, 12));
        app.handle_key(press(KeyCode::Char('M')));
        assert!(app.query.month_range.is_none());
    }

    #[tokio::test]
    async fn test_escape_clears_filters_but_keeps_sort_and_columns() {
        let mut app = loaded_app().await;
        app.query = app
            .query
            .with_search("alice")
            .with_sort_toggled(keys::DATE)
            .with_column_toggled(keys::STUDIO)
            .with_selection(keys::PRODUCT_TYPE, Selection::from_choice("Free"));

        app.handle_key(press(KeyCode::Esc));
        assert!(app.query.search.is_empty());
        assert!(app.query.categorical.is_empty());
        assert!(app.query.sort.is_some());
        assert!(app.query.visible_columns.contains(keys::STUDIO));
    }

    // ── Cursors ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cursors_are_clamped() {
        let mut app = loaded_app().await;
        for _ in 0..10 {
            app.handle_key(press(KeyCode::Down));
            app.handle_key(press(KeyCode::Right));
        }
        assert_eq!(app.row_cursor, 2);
        assert_eq!(app.column_cursor, app.visible_columns().len() - 1);

        app.handle_key(press(KeyCode::Char('/')));
        type_text(&mut app, "bob");
        assert_eq!(app.row_cursor, 0);
    }

    // ── Columns ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_column_picker_toggles_visibility() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Char('c')));
        assert_eq!(app.input_mode, InputMode::Columns);

        // First registry field is the date.
        app.handle_key(press(KeyCode::Char(' ')));
        assert!(!app.query.visible_columns.contains(keys::DATE));
        app.handle_key(press(KeyCode::Char(' ')));
        assert!(app.query.visible_columns.contains(keys::DATE));

        app.handle_key(press(KeyCode::Esc));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_edit_produces_replacement_record() {
        let mut app = loaded_app().await;
        let columns = app.visible_columns();
        app.column_cursor = columns.iter().position(|c| c == keys::TOPIC).unwrap();
        app.row_cursor = 1;

        app.handle_key(press(KeyCode::Char('e')));
        assert_eq!(app.edit_buffer, "Limits");
        for _ in 0.."Limits".len() {
            app.handle_key(press(KeyCode::Backspace));
        }
        type_text(&mut app, "Series");

        let command = app.handle_key(press(KeyCode::Enter));
        match command {
            Some(DashboardCommand::Edit(record)) => {
                assert_eq!(record.id, "row-1");
                assert_eq!(record.text(keys::TOPIC), "Series");
                assert_eq!(record.text(keys::TEACHER), "Bob");
            }
            other => panic!("expected edit command, got {other:?}"),
        }
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_edit_escape_cancels() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Char('e')));
        assert!(matches!(app.input_mode, InputMode::Edit { .. }));
        assert_eq!(app.handle_key(press(KeyCode::Esc)), None);
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.edit_buffer.is_empty());
    }

    // ── Teachers view ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_teacher_cursor_moves_within_groups() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Tab));
        assert_eq!(app.group_names(), vec!["Alice", "Bob"]);

        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Down));
        assert_eq!(app.group_cursor, 1);
        app.handle_key(press(KeyCode::Up));
        assert_eq!(app.group_cursor, 0);
    }

    #[tokio::test]
    async fn test_space_toggles_group_comparison() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Tab));

        app.handle_key(press(KeyCode::Char(' ')));
        let selection = app.query.group_selection.clone().unwrap();
        assert_eq!(selection.field, keys::TEACHER);
        assert!(selection.values.contains("Alice"));
        assert_eq!(app.visible_records().len(), 2);

        app.handle_key(press(KeyCode::Down));
        app.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(app.visible_records().len(), 3);
        let s = screen(&app);
        assert!(s.contains("Compare (2)"), "got:\n{s}");

        app.handle_key(press(KeyCode::Tab));
        assert!(screen(&app).contains("Compare: Alice, Bob"));
    }

    #[tokio::test]
    async fn test_deselecting_every_group_shows_nothing() {
        let mut app = loaded_app().await;
        app.handle_key(press(KeyCode::Tab));
        app.handle_key(press(KeyCode::Char(' ')));
        app.handle_key(press(KeyCode::Char(' ')));

        assert_eq!(
            app.query.group_selection.as_ref().map(|s| s.values.len()),
            Some(0)
        );
        assert!(app.visible_records().is_empty());
        assert!(screen(&app).contains("Nothing selected"));

        app.handle_key(press(KeyCode::Char('x')));
        assert!(app.query.group_selection.is_none());
        assert_eq!(app.visible_records().len(), 3);
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    #[test]
    fn test_render_before_first_snapshot() {
        let app = App::new("dark", ViewMode::Table, "teacher".to_string(), 3);
        let s = screen(&app);
        assert!(s.contains("CLASS DASHBOARD"));
        assert!(s.contains("Importing classes"));
    }

    #[tokio::test]
    async fn test_render_table_and_teachers() {
        let mut app = loaded_app().await;
        let table = screen(&app);
        assert!(table.contains("test grid"));
        assert!(table.contains("3 of 3 records"));
        assert!(table.contains("Vectors"));

        app.handle_key(press(KeyCode::Tab));
        let teachers = screen(&app);
        assert!(teachers.contains("Most Classes"));
        assert!(teachers.contains("Profile"));
    }

    #[tokio::test]
    async fn test_snapshot_error_is_rendered() {
        let mut app = loaded_app().await;
        let mut data = snapshot().await;
        data.last_error = Some("Sheet source unavailable: timeout".to_string());
        app.update_from_snapshot(data);

        assert!(screen(&app).contains("Sheet source unavailable: timeout"));
    }
}
