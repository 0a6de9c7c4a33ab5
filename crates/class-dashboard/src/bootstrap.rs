use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dashboard_core::error::DashboardError;
use dashboard_core::settings::Settings;
use dashboard_data::enricher::{HttpEnricher, NoopEnricher, RowEnricher, TemplateEnricher};
use dashboard_data::pipeline::{EnrichmentFailurePolicy, PipelineConfig};
use dashboard_data::source::{open_file_source, GoogleSheetsSource, SheetSource};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// `~/.class-dashboard`, or `./.class-dashboard` without a home directory.
pub fn dashboard_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".class-dashboard")
}

/// Ensure `~/.class-dashboard/` and `~/.class-dashboard/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<PathBuf> {
    let dir = dashboard_dir();
    std::fs::create_dir_all(dir.join("logs"))
        .with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir)
}

/// Log file used when the terminal UI owns the screen and no `--log-file`
/// was given.
pub fn default_log_file(dashboard_dir: &Path) -> PathBuf {
    dashboard_dir.join("logs").join("class-dashboard.log")
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map the CLI level names onto `tracing` filter directives.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        other => other.to_lowercase(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// With `log_file` set, output is appended to that file (no ANSI colours);
/// otherwise it goes to stderr. Unknown levels fall back to `info`.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()?;
        }
    }

    Ok(())
}

// ── Collaborator wiring ────────────────────────────────────────────────────────

/// A local file when `--file` is given, otherwise Google Sheets.
pub fn build_source(settings: &Settings) -> Result<Arc<dyn SheetSource>, DashboardError> {
    if let Some(path) = &settings.file {
        return Ok(Arc::from(open_file_source(path)));
    }

    let url = settings.sheet_url.as_deref().ok_or_else(|| {
        DashboardError::Config(
            "no sheet given: pass --sheet-url (or CLASS_DASHBOARD_SHEET_URL) or --file".to_string(),
        )
    })?;
    if settings.api_key.is_none() {
        tracing::warn!("no API key configured; only public sheets can be read");
    }
    let source = GoogleSheetsSource::new(
        url,
        settings.sheet_name.clone(),
        settings.range.clone(),
        settings.api_key.clone(),
    )?;
    Ok(Arc::new(source))
}

pub fn build_enricher(settings: &Settings) -> Result<Arc<dyn RowEnricher>, DashboardError> {
    match settings.enricher.as_str() {
        "template" => Ok(Arc::new(TemplateEnricher)),
        "http" => {
            let url = settings.enrichment_url.as_deref().ok_or_else(|| {
                DashboardError::Config(
                    "--enricher http needs --enrichment-url (or CLASS_DASHBOARD_ENRICHMENT_URL)"
                        .to_string(),
                )
            })?;
            let enricher = HttpEnricher::from_url(url)?;
            match settings.summary_url.as_deref() {
                Some(summary) => Ok(Arc::new(enricher.with_summary_url(summary)?)),
                None => Ok(Arc::new(enricher)),
            }
        }
        _ => Ok(Arc::new(NoopEnricher)),
    }
}

pub fn pipeline_config(settings: &Settings) -> PipelineConfig {
    let failure_policy = EnrichmentFailurePolicy::from_name(&settings.on_enrichment_failure)
        .unwrap_or_else(|| {
            tracing::warn!(
                policy = %settings.on_enrichment_failure,
                "unknown enrichment failure policy; dropping failed rows"
            );
            EnrichmentFailurePolicy::Drop
        });
    PipelineConfig {
        anchor: settings.anchor.clone(),
        concurrency: settings.concurrency as usize,
        failure_policy,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["class-dashboard"];
        argv.extend_from_slice(args);
        Settings::parse_from(argv)
    }

    // ── Directories ───────────────────────────────────────────────────────────

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        // Override HOME so that dirs::home_dir() resolves to our temp dir.
        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        let dir = result.expect("ensure_directories should succeed");
        assert_eq!(dir, tmp.path().join(".class-dashboard"));
        assert!(dir.join("logs").is_dir(), "logs subdir must exist");
        assert_eq!(
            default_log_file(&dir),
            dir.join("logs").join("class-dashboard.log")
        );
    }

    // ── Logging ───────────────────────────────────────────────────────────────

    #[test]
    fn test_level_directive_mapping() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("Trace"), "trace");
    }

    // ── Source / enricher wiring ──────────────────────────────────────────────

    #[test]
    fn test_build_source_prefers_file() {
        let s = settings(&[
            "--file",
            "classes.csv",
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/1AbCdEfGhIjK/edit",
        ]);
        let source = build_source(&s).unwrap();
        assert!(source.describe().contains("classes.csv"), "{}", source.describe());
    }

    #[test]
    fn test_build_source_google_sheets() {
        let s = settings(&[
            "--sheet-url",
            "https://docs.google.com/spreadsheets/d/1AbCdEfGhIjK/edit#gid=0",
        ]);
        let source = build_source(&s).unwrap();
        assert!(source.describe().contains("1AbCdEfGhIjK"), "{}", source.describe());
    }

    #[test]
    fn test_build_source_requires_sheet_or_file() {
        let mut s = settings(&[]);
        s.sheet_url = None;
        s.file = None;
        assert!(matches!(build_source(&s), Err(DashboardError::Config(_))));
    }

    #[test]
    fn test_build_source_rejects_bad_url() {
        let mut s = settings(&[]);
        s.sheet_url = Some("https://example.com/nothing".to_string());
        assert!(matches!(
            build_source(&s),
            Err(DashboardError::InvalidSheetUrl(_))
        ));
    }

    #[test]
    fn test_build_enricher_variants() {
        assert_eq!(build_enricher(&settings(&[])).unwrap().name(), "none");
        assert_eq!(
            build_enricher(&settings(&["--enricher", "template"]))
                .unwrap()
                .name(),
            "template"
        );

        let mut http = settings(&["--enricher", "http"]);
        http.enrichment_url = None;
        assert!(matches!(build_enricher(&http), Err(DashboardError::Config(_))));

        http.enrichment_url = Some("http://localhost:8080/enrich".to_string());
        assert_eq!(build_enricher(&http).unwrap().name(), "http");

        http.summary_url = Some("http://localhost:8080/summary".to_string());
        assert_eq!(build_enricher(&http).unwrap().name(), "http");

        http.summary_url = Some("not a url".to_string());
        assert!(matches!(build_enricher(&http), Err(DashboardError::Config(_))));
    }

    #[test]
    fn test_pipeline_config_from_settings() {
        let s = settings(&[
            "--anchor",
            "Class Date",
            "--concurrency",
            "4",
            "--on-enrichment-failure",
            "keep",
        ]);
        let config = pipeline_config(&s);
        assert_eq!(config.anchor, "Class Date");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.failure_policy, EnrichmentFailurePolicy::Keep);

        let defaults = pipeline_config(&settings(&[]));
        assert_eq!(defaults.failure_policy, EnrichmentFailurePolicy::Drop);
        assert_eq!(defaults.concurrency, 8);
    }
}
