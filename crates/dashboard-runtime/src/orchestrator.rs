//! Async dashboard orchestrator.
//!
//! Runs the [`DataManager`] inside a tokio task. The UI sends
//! [`DashboardCommand`]s in and receives immutable [`DashboardData`]
//! snapshots back, so the event loop never shares mutable state with the
//! import.

use std::sync::Arc;

use dashboard_core::models::Record;
use dashboard_data::pipeline::RecordSet;
use tokio::sync::mpsc;

use crate::data_manager::DataManager;

// ── Public types ──────────────────────────────────────────────────────────────

/// Requests the UI can make of the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardCommand {
    /// Fetch the sheet again and rebuild the record set.
    Import,
    /// Replace one record wholesale by id.
    Edit(Record),
}

/// A snapshot forwarded to the presentation layer after every command.
#[derive(Debug, Clone)]
pub struct DashboardData {
    /// The current record set; `None` until the first successful import.
    pub records: Option<Arc<RecordSet>>,
    /// Error from the most recent command, if it failed.
    pub last_error: Option<String>,
    /// Successful imports since startup.
    pub import_count: usize,
    /// Description of the sheet source.
    pub source: String,
}

// ── DashboardOrchestrator ─────────────────────────────────────────────────────

pub struct DashboardOrchestrator {
    data_manager: DataManager,
}

impl DashboardOrchestrator {
    pub fn new(data_manager: DataManager) -> Self {
        Self { data_manager }
    }

    /// Spawn the runtime task. It imports once immediately, then serves
    /// commands until either channel end is dropped.
    ///
    /// Returns the command sender, the snapshot receiver and a handle that
    /// can abort the task.
    pub fn start(
        self,
    ) -> (
        mpsc::Sender<DashboardCommand>,
        mpsc::Receiver<DashboardData>,
        DashboardHandle,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (data_tx, data_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.command_loop(cmd_rx, data_tx).await;
        });

        (cmd_tx, data_rx, DashboardHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn command_loop(
        mut self,
        mut commands: mpsc::Receiver<DashboardCommand>,
        tx: mpsc::Sender<DashboardData>,
    ) {
        let outcome = self.data_manager.import().await.map(|_| ());
        if !self.send_snapshot(&tx, outcome.err().map(|e| e.to_string())).await {
            return;
        }

        while let Some(command) = commands.recv().await {
            let error = match command {
                DashboardCommand::Import => self.data_manager.import().await.err(),
                DashboardCommand::Edit(record) => self.data_manager.apply_edit(record).err(),
            };
            if !self.send_snapshot(&tx, error.map(|e| e.to_string())).await {
                break;
            }
        }
        tracing::debug!("dashboard command loop exiting");
    }

    /// Send the current state; `false` when the receiver is gone.
    async fn send_snapshot(&self, tx: &mpsc::Sender<DashboardData>, error: Option<String>) -> bool {
        let snapshot = DashboardData {
            records: self.data_manager.current(),
            last_error: error,
            import_count: self.data_manager.import_count(),
            source: self.data_manager.source_description(),
        };
        if let Err(e) = tx.send(snapshot).await {
            tracing::warn!(error = %e, "failed to send dashboard snapshot; receiver dropped");
            return false;
        }
        true
    }
}

// ── DashboardHandle ───────────────────────────────────────────────────────────

/// Handle to the background task. Call [`DashboardHandle::abort`] to stop it.
pub struct DashboardHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl DashboardHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
