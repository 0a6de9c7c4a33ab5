mod bootstrap;

use anyhow::Result;
use serde_json::json;

use dashboard_core::models::keys;
use dashboard_core::settings::Settings;
use dashboard_data::aggregator::GroupAggregator;
use dashboard_data::pipeline::{ImportPipeline, RecordSet};
use dashboard_runtime::data_manager::DataManager;
use dashboard_runtime::orchestrator::DashboardOrchestrator;
use dashboard_ui::app::{App, ViewMode};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    let dashboard_dir = bootstrap::ensure_directories()?;
    // The TUI owns the terminal, so interactive runs always log to a file.
    let log_file = settings.log_file.clone().or_else(|| {
        settings
            .is_interactive()
            .then(|| bootstrap::default_log_file(&dashboard_dir))
    });
    bootstrap::setup_logging(&settings.log_level, log_file.as_deref())?;

    tracing::info!("Class Dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        view = %settings.view,
        theme = %settings.theme,
        enricher = %settings.enricher,
        "settings loaded"
    );

    let source = bootstrap::build_source(&settings)?;
    let enricher = bootstrap::build_enricher(&settings)?;
    let pipeline = ImportPipeline::new(enricher, bootstrap::pipeline_config(&settings));
    let manager = DataManager::new(source, pipeline);
    let top_n = settings.top as usize;

    if !settings.is_interactive() {
        return export(manager, &settings.group_by, top_n).await;
    }

    let (commands, rx, handle) = DashboardOrchestrator::new(manager).start();
    let app = App::new(
        &settings.theme,
        ViewMode::from_name(&settings.view),
        settings.group_by.clone(),
        top_n,
    );

    // Ctrl+C is also caught at the OS level so a signal that arrives while
    // the terminal is in raw mode still shuts the runtime task down.
    tokio::select! {
        result = app.run(rx, commands) => {
            handle.abort();
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; shutting down dashboard task");
            handle.abort();
        }
    }

    Ok(())
}

/// Import once and print the records, the import report and the
/// leaderboard as one JSON document on stdout.
async fn export(mut manager: DataManager, group_by: &str, top_n: usize) -> Result<()> {
    tracing::info!(source = %manager.source_description(), "exporting");
    let set = manager.import().await?;
    let document = export_document(&set, group_by, top_n);
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

fn export_document(set: &RecordSet, group_by: &str, top_n: usize) -> serde_json::Value {
    let group_by = if group_by.is_empty() { keys::TEACHER } else { group_by };
    let grouped = GroupAggregator::aggregate(&set.records, group_by);
    let leaderboard = GroupAggregator::leaderboard(&grouped, top_n);
    json!({
        "report": set.report,
        "records": set.records,
        "leaderboard": leaderboard,
    })
}
