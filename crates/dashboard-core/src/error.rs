use std::path::PathBuf;
use thiserror::Error;

/// All import-level errors produced by the class dashboard.
///
/// Every variant aborts the whole import; the previously imported record set
/// stays in place.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// No row in the fetched range contains the anchor header label.
    #[error("Header row not found: no row among the first {rows_scanned} contains \"{anchor}\"")]
    HeaderRowNotFound { anchor: String, rows_scanned: usize },

    /// The sheet provider could not be reached or refused the request.
    #[error("Sheet source unavailable: {0}")]
    SourceUnavailable(String),

    /// The sheet provider answered with something that is not a cell grid.
    #[error("Unexpected sheet data: {0}")]
    SourceFormat(String),

    /// A sheet URL did not contain a spreadsheet id.
    #[error("Invalid sheet URL: {0}")]
    InvalidSheetUrl(String),

    /// A local grid file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An edit referenced a record id that is not in the current set.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// An operation needed an imported record set but none exists yet.
    #[error("No data has been imported yet")]
    NoData,

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashboardError {
    /// `true` for failures worth retrying (network blips, provider hiccups).
    pub fn is_transient(&self) -> bool {
        matches!(self, DashboardError::SourceUnavailable(_))
    }
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// A failure confined to a single data row.
///
/// Row errors never abort an import; the pipeline records them in the import
/// report and applies its failure policy to the row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The enrichment capability reported a failure.
    #[error("enrichment failed: {0}")]
    Enrichment(String),

    /// The enrichment capability answered outside its output schema.
    #[error("enrichment response violated schema: {0}")]
    EnrichmentSchema(String),

    /// The enrichment endpoint could not be reached.
    #[error("enrichment transport error: {0}")]
    Transport(String),
}
