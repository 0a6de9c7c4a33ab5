use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Terminal dashboard for class schedules and attendance kept in a spreadsheet
#[derive(Parser, Debug, Clone)]
#[command(
    name = "class-dashboard",
    about = "Terminal dashboard for class schedules and attendance kept in a spreadsheet",
    version
)]
pub struct Settings {
    /// Google Sheets URL or bare spreadsheet id
    #[arg(long, env = "CLASS_DASHBOARD_SHEET_URL")]
    pub sheet_url: Option<String>,

    /// Sheet (tab) name inside the spreadsheet
    #[arg(long, default_value = "Sheet1")]
    pub sheet_name: String,

    /// A1 range to fetch
    #[arg(long, default_value = "A1:BZ")]
    pub range: String,

    /// Google Sheets API key
    #[arg(long, env = "GOOGLE_SHEETS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Read the grid from a local .csv or .json file instead of Google Sheets
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Header label that marks the header row
    #[arg(long, default_value = "Date")]
    pub anchor: String,

    /// Title/caption generator
    #[arg(long, default_value = "none", value_parser = ["none", "template", "http"])]
    pub enricher: String,

    /// Endpoint for the http enricher
    #[arg(long, env = "CLASS_DASHBOARD_ENRICHMENT_URL")]
    pub enrichment_url: Option<String>,

    /// Feedback summary endpoint for the http enricher
    #[arg(long, env = "CLASS_DASHBOARD_SUMMARY_URL")]
    pub summary_url: Option<String>,

    /// What to do with a row whose enrichment fails
    #[arg(long, default_value = "drop", value_parser = ["drop", "keep"])]
    pub on_enrichment_failure: String,

    /// Rows enriched concurrently (1-64)
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub concurrency: u32,

    /// View mode
    #[arg(long, default_value = "table", value_parser = ["table", "teachers", "export"])]
    pub view: String,

    /// Field used to group records in the teachers view
    #[arg(long, default_value = "teacher")]
    pub group_by: String,

    /// Entries per leaderboard
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=50))]
    pub top: u32,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.class-dashboard/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enricher: Option<String>,
}

impl LastUsedParams {
    /// Default path of the persisted file, under the home directory.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".class-dashboard").join("last_used.json")
    }

    /// Load persisted params; `Default` when the file is absent or unreadable.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Write params through a temp file and rename.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }

    /// Delete the file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments, merge last-used params and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return settings.finalize();
        }

        let last = LastUsedParams::load_from(config_path);

        // clap keys args by field name, not by the hyphenated flag.
        merge_string(&matches, "sheet_name", &mut settings.sheet_name, last.sheet_name);
        merge_string(&matches, "range", &mut settings.range, last.range);
        merge_string(&matches, "theme", &mut settings.theme, last.theme);
        merge_string(&matches, "view", &mut settings.view, last.view);
        merge_string(&matches, "group_by", &mut settings.group_by, last.group_by);
        merge_string(&matches, "enricher", &mut settings.enricher, last.enricher);
        if settings.sheet_url.is_none() {
            settings.sheet_url = last.sheet_url;
        }

        let settings = settings.finalize();

        let _ = LastUsedParams::from(&settings).save_to(config_path);

        settings
    }

    /// Apply `--debug`.
    fn finalize(mut self) -> Self {
        if self.debug {
            self.log_level = "DEBUG".to_string();
        }
        self
    }

    /// `true` when the interactive terminal UI will own stdout.
    pub fn is_interactive(&self) -> bool {
        self.view != "export"
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            sheet_url: s.sheet_url.clone(),
            sheet_name: Some(s.sheet_name.clone()),
            range: Some(s.range.clone()),
            theme: Some(s.theme.clone()),
            view: Some(s.view.clone()),
            group_by: Some(s.group_by.clone()),
            enricher: Some(s.enricher.clone()),
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────────

/// `true` when `name` was given on the command line, not via default or env.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

fn merge_string(
    matches: &clap::ArgMatches,
    name: &str,
    target: &mut String,
    persisted: Option<String>,
) {
    if is_arg_explicitly_set(matches, name) {
        return;
    }
    if let Some(value) = persisted {
        *target = value;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
