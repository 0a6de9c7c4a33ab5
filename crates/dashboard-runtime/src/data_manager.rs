//! Record store for the dashboard runtime.
//!
//! Owns the current [`RecordSet`] behind an `Arc`. An import builds a whole
//! new set and swaps the pointer, so readers holding the old `Arc` keep a
//! consistent snapshot and never observe a partial import. A failed import
//! leaves the previous set in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::Record;
use dashboard_data::pipeline::{ImportPipeline, RecordSet};
use dashboard_data::source::SheetSource;

/// Maximum number of fetch attempts for transient source failures.
const MAX_RETRY_ATTEMPTS: u32 = 3;

// ── DataManager ───────────────────────────────────────────────────────────────

pub struct DataManager {
    source: Arc<dyn SheetSource>,
    pipeline: ImportPipeline,
    /// Most recently published record set.
    current: Option<Arc<RecordSet>>,
    /// Human-readable description of the last import error.
    last_error: Option<String>,
    /// When the current set was published.
    last_successful_import: Option<Instant>,
    /// Successful imports since startup.
    import_count: usize,
    /// Base delay between retries; attempt `n` waits `n * retry_delay`.
    retry_delay: Duration,
}

impl DataManager {
    pub fn new(source: Arc<dyn SheetSource>, pipeline: ImportPipeline) -> Self {
        Self {
            source,
            pipeline,
            current: None,
            last_error: None,
            last_successful_import: None,
            import_count: 0,
            retry_delay: Duration::from_millis(100),
        }
    }

    /// Override the retry back-off base.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Fetch the grid and run the pipeline. On success the new set replaces
    /// the current one; on failure the current set is kept and the error is
    /// returned and remembered.
    pub async fn import(&mut self) -> Result<Arc<RecordSet>> {
        let outcome = match self.fetch_with_retry().await {
            Ok(rows) => self.pipeline.import(&rows).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(set) => {
                let set = Arc::new(set);
                tracing::info!(
                    records = set.len(),
                    dropped = set.report.dropped.len(),
                    source = %self.source.describe(),
                    "record set published"
                );
                self.current = Some(Arc::clone(&set));
                self.last_error = None;
                self.last_successful_import = Some(Instant::now());
                self.import_count += 1;
                Ok(set)
            }
            Err(e) => {
                tracing::warn!(error = %e, "import failed; keeping previous record set");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Replace the record with `edited.id` and publish the result.
    pub fn apply_edit(&mut self, edited: Record) -> Result<Arc<RecordSet>> {
        let current = self.current.as_ref().ok_or(DashboardError::NoData)?;
        let id = edited.id.clone();
        let next = Arc::new(current.with_replaced(edited)?);
        tracing::debug!(record = %id, "record edited");
        self.current = Some(Arc::clone(&next));
        Ok(next)
    }

    /// The currently published record set, if any.
    pub fn current(&self) -> Option<Arc<RecordSet>> {
        self.current.clone()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Age of the current record set.
    pub fn data_age(&self) -> Option<Duration> {
        self.last_successful_import.map(|ts| ts.elapsed())
    }

    pub fn import_count(&self) -> usize {
        self.import_count
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Fetch up to [`MAX_RETRY_ATTEMPTS`] times, retrying transient errors
    /// only. Back-off: 0, 1x, 2x `retry_delay`.
    async fn fetch_with_retry(&self) -> Result<Vec<Vec<String>>> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let sleep = self.retry_delay * attempt;
                tracing::debug!(attempt, sleep_ms = sleep.as_millis() as u64, "retrying fetch after back-off");
                tokio::time::sleep(sleep).await;
            }

            match self.source.fetch().await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "fetch attempt failed");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashboard_core::models::keys;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Source that replays a scripted sequence of results.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Vec<Vec<String>>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<Vec<String>>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SheetSource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch(&self) -> Result<Vec<Vec<String>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DashboardError::SourceUnavailable("script exhausted".into())))
        }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn alice_grid() -> Vec<Vec<String>> {
        grid(&[&["Date", "Teacher"], &["2024-01-01", "Alice"], &["2024-01-02", "Alice"]])
    }

    fn manager(source: Arc<ScriptedSource>) -> DataManager {
        DataManager::new(source, ImportPipeline::default()).with_retry_delay(Duration::from_millis(1))
    }

    // ── import ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_import_publishes_record_set() {
        let mut mgr = manager(ScriptedSource::new(vec![Ok(alice_grid())]));
        assert!(mgr.current().is_none());

        let set = mgr.import().await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(mgr.import_count(), 1);
        assert!(mgr.last_error().is_none());
        assert!(mgr.data_age().is_some());
        assert!(Arc::ptr_eq(&set, &mgr.current().unwrap()));
    }

    #[tokio::test]
    async fn test_failed_import_keeps_previous_set() {
        let source = ScriptedSource::new(vec![
            Ok(alice_grid()),
            Ok(grid(&[&["No anchor here"], &["x"]])),
        ]);
        let mut mgr = manager(source);

        let first = mgr.import().await.unwrap();
        let err = mgr.import().await.unwrap_err();

        assert!(matches!(err, DashboardError::HeaderRowNotFound { .. }));
        assert!(Arc::ptr_eq(&first, &mgr.current().unwrap()));
        assert!(mgr.last_error().unwrap().contains("Header row not found"));
        assert_eq!(mgr.import_count(), 1);
    }

    #[tokio::test]
    async fn test_reader_snapshot_survives_new_import() {
        let source = ScriptedSource::new(vec![
            Ok(alice_grid()),
            Ok(grid(&[&["Date", "Teacher"], &["2024-02-01", "Bob"]])),
        ]);
        let mut mgr = manager(source);

        let old = mgr.import().await.unwrap();
        let new = mgr.import().await.unwrap();

        assert_eq!(old.len(), 2);
        assert_eq!(new.len(), 1);
        assert_eq!(old.records[0].text(keys::TEACHER), "Alice");
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let source = ScriptedSource::new(vec![
            Err(DashboardError::SourceUnavailable("timeout".into())),
            Err(DashboardError::SourceUnavailable("timeout".into())),
            Ok(alice_grid()),
        ]);
        let mut mgr = manager(Arc::clone(&source));

        let set = mgr.import().await.unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_stop_after_max_attempts() {
        let source = ScriptedSource::new(vec![
            Err(DashboardError::SourceUnavailable("1".into())),
            Err(DashboardError::SourceUnavailable("2".into())),
            Err(DashboardError::SourceUnavailable("3".into())),
            Ok(alice_grid()),
        ]);
        let mut mgr = manager(Arc::clone(&source));

        let err = mgr.import().await.unwrap_err();
        assert_eq!(err.to_string(), "Sheet source unavailable: 3");
        assert_eq!(source.calls.load(Ordering::SeqCst), MAX_RETRY_ATTEMPTS as usize);
        assert!(mgr.current().is_none());
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let source = ScriptedSource::new(vec![
            Err(DashboardError::SourceFormat("not a grid".into())),
            Ok(alice_grid()),
        ]);
        let mut mgr = manager(Arc::clone(&source));

        assert!(mgr.import().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    // ── apply_edit ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_apply_edit_replaces_by_id() {
        let mut mgr = manager(ScriptedSource::new(vec![Ok(alice_grid())]));
        let before = mgr.import().await.unwrap();

        let edited = before.records[1].with_field(keys::TOPIC, "Kinematics");
        let after = mgr.apply_edit(edited).unwrap();

        assert_eq!(after.records[1].text(keys::TOPIC), "Kinematics");
        assert_eq!(after.records[0], before.records[0]);
        assert_eq!(before.records[1].text(keys::TOPIC), "");
        assert!(Arc::ptr_eq(&after, &mgr.current().unwrap()));
    }

    #[tokio::test]
    async fn test_apply_edit_unknown_id() {
        let mut mgr = manager(ScriptedSource::new(vec![Ok(alice_grid())]));
        mgr.import().await.unwrap();

        let stray = Record::new("row-42", Default::default());
        assert!(matches!(
            mgr.apply_edit(stray),
            Err(DashboardError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_apply_edit_without_data() {
        let mut mgr = manager(ScriptedSource::new(vec![]));
        let record = Record::new("row-0", Default::default());
        assert!(matches!(mgr.apply_edit(record), Err(DashboardError::NoData)));
    }
}
