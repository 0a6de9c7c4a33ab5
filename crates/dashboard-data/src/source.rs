//! Where raw cell grids come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashboard_core::error::{DashboardError, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

/// Public Google Sheets API root.
pub const GOOGLE_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

// ── Trait ─────────────────────────────────────────────────────────────────────

/// A provider of a rectangular-ish grid of strings.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Human-readable description for logs and the UI header.
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<Vec<String>>>;
}

// ── Google Sheets ─────────────────────────────────────────────────────────────

/// Extract the spreadsheet id from a sheet URL, or accept a bare id.
///
/// ```
/// use dashboard_data::source::parse_spreadsheet_id;
///
/// let id = parse_spreadsheet_id("https://docs.google.com/spreadsheets/d/1AbC-x_9/edit#gid=0").unwrap();
/// assert_eq!(id, "1AbC-x_9");
/// ```
pub fn parse_spreadsheet_id(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let re = Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("regex is valid");
    if let Some(caps) = re.captures(trimmed) {
        return Ok(caps[1].to_string());
    }
    let bare = Regex::new(r"^[a-zA-Z0-9_-]{10,}$").expect("regex is valid");
    if bare.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(DashboardError::InvalidSheetUrl(input.to_string()))
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Cell JSON → text. Null becomes `""`; numbers and booleans use their JSON
/// spelling.
fn cell_to_string(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reads one range through the Sheets `values.get` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleSheetsSource {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    sheet_name: String,
    range: String,
    api_key: Option<String>,
}

impl GoogleSheetsSource {
    pub fn new(
        sheet_url: &str,
        sheet_name: impl Into<String>,
        range: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: GOOGLE_SHEETS_API_BASE.to_string(),
            spreadsheet_id: parse_spreadsheet_id(sheet_url)?,
            sheet_name: sheet_name.into(),
            range: range.into(),
            api_key,
        })
    }

    /// Point at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Full request URL for the configured range.
    pub fn values_url(&self) -> Result<reqwest::Url> {
        let range = format!("{}!{}", self.sheet_name, self.range);
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DashboardError::Config(format!("bad API base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DashboardError::Config("API base url cannot have a path".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsSource {
    fn describe(&self) -> String {
        format!(
            "Google Sheet {} ({}!{})",
            self.spreadsheet_id, self.sheet_name, self.range
        )
    }

    async fn fetch(&self) -> Result<Vec<Vec<String>>> {
        let url = self.values_url()?;
        debug!("Fetching sheet values for {}", self.spreadsheet_id);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::SourceUnavailable(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| DashboardError::SourceFormat(e.to_string()))?;

        let rows: Vec<Vec<String>> = range
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        info!("Fetched {} rows from {}", rows.len(), self.describe());
        Ok(rows)
    }
}

// ── Local files ───────────────────────────────────────────────────────────────

/// Reads a CSV export of the sheet. Rows may be ragged.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse CSV text into rows.
    pub fn parse(content: &str) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| DashboardError::SourceFormat(e.to_string()))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

#[async_trait]
impl SheetSource for CsvFileSource {
    fn describe(&self) -> String {
        format!("CSV file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<Vec<String>>> {
        let content = read_file(&self.path).await?;
        Self::parse(&content)
    }
}

/// Reads a JSON grid: either `[[...], ...]` or a saved values response
/// `{"values": [[...], ...]}`.
#[derive(Debug, Clone)]
pub struct JsonGridSource {
    path: PathBuf,
}

impl JsonGridSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(content: &str) -> Result<Vec<Vec<String>>> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let grid = match &value {
            serde_json::Value::Array(rows) => rows,
            serde_json::Value::Object(obj) => match obj.get("values") {
                Some(serde_json::Value::Array(rows)) => rows,
                None => return Ok(Vec::new()),
                Some(_) => {
                    return Err(DashboardError::SourceFormat(
                        "`values` must be an array of rows".into(),
                    ))
                }
            },
            _ => {
                return Err(DashboardError::SourceFormat(
                    "expected an array of rows".into(),
                ))
            }
        };

        grid.iter()
            .enumerate()
            .map(|(i, row)| match row {
                serde_json::Value::Array(cells) => Ok(cells.iter().map(cell_to_string).collect()),
                _ => Err(DashboardError::SourceFormat(format!(
                    "row {} is not an array",
                    i
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl SheetSource for JsonGridSource {
    fn describe(&self) -> String {
        format!("JSON file {}", self.path.display())
    }

    async fn fetch(&self) -> Result<Vec<Vec<String>>> {
        let content = read_file(&self.path).await?;
        Self::parse(&content)
    }
}

/// Pick a file source by extension: `.json` → [`JsonGridSource`], anything
/// else → [`CsvFileSource`].
pub fn open_file_source(path: &Path) -> Box<dyn SheetSource> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        Box::new(JsonGridSource::new(path))
    } else {
        Box::new(CsvFileSource::new(path))
    }
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DashboardError::FileRead {
            path: path.to_path_buf(),
            source,
        })
}
