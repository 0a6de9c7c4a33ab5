//! Import pipeline: raw grid → header resolution → per-row normalisation and
//! enrichment → [`RecordSet`].

use std::sync::Arc;

use chrono::Utc;
use dashboard_core::error::{DashboardError, Result};
use dashboard_core::models::Record;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::enricher::{EnrichmentInput, NoopEnricher, RowEnricher};
use crate::headers::{HeaderResolver, DEFAULT_ANCHOR};
use crate::normalizer::RowNormalizer;

/// Default number of rows enriched at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

// ── Configuration ─────────────────────────────────────────────────────────────

/// What happens to a row whose enrichment fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentFailurePolicy {
    /// Leave the row out of the record set.
    #[default]
    Drop,
    /// Keep the row as imported, with the sheet's own title and caption.
    Keep,
}

impl EnrichmentFailurePolicy {
    /// Parse the CLI spelling (`drop` / `keep`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "drop" => Some(Self::Drop),
            "keep" => Some(Self::Keep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Cell text that marks the header row.
    pub anchor: String,
    /// Rows in flight at once; clamped to at least 1.
    pub concurrency: usize,
    pub failure_policy: EnrichmentFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            anchor: DEFAULT_ANCHOR.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: EnrichmentFailurePolicy::Drop,
        }
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// A data row that did not make it into the record set unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRow {
    /// 0-based index among the post-header rows.
    pub index: usize,
    pub reason: String,
}

/// Metadata produced alongside the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// ISO-8601 timestamp when this import finished.
    pub generated_at: String,
    /// Row index of the header row in the fetched grid.
    pub header_row_index: usize,
    /// Rows after the header row, blank ones included.
    pub data_rows: usize,
    /// Rows skipped because every cell was empty.
    pub blank_rows: usize,
    /// Records in the resulting set.
    pub imported: usize,
    /// Rows whose enrichment failed, with the reason. Under
    /// [`EnrichmentFailurePolicy::Keep`] these rows are still imported.
    pub dropped: Vec<DroppedRow>,
    /// Headers kept verbatim because no alias matched.
    pub unmapped_headers: Vec<String>,
    /// Wall-clock seconds spent normalising and enriching.
    pub elapsed_seconds: f64,
}

/// The complete output of one import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub records: Vec<Record>,
    pub report: ImportReport,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// New set with the record sharing `edited.id` replaced wholesale.
    pub fn with_replaced(&self, edited: Record) -> Result<RecordSet> {
        let pos = self
            .records
            .iter()
            .position(|r| r.id == edited.id)
            .ok_or_else(|| DashboardError::RecordNotFound(edited.id.clone()))?;
        let mut records = self.records.clone();
        records[pos] = edited;
        Ok(RecordSet {
            records,
            report: self.report.clone(),
        })
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Turns a fetched grid into a [`RecordSet`].
#[derive(Clone)]
pub struct ImportPipeline {
    resolver: HeaderResolver,
    enricher: Arc<dyn RowEnricher>,
    config: PipelineConfig,
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self::new(Arc::new(NoopEnricher), PipelineConfig::default())
    }
}

impl ImportPipeline {
    pub fn new(enricher: Arc<dyn RowEnricher>, config: PipelineConfig) -> Self {
        Self {
            resolver: HeaderResolver::new(),
            enricher,
            config,
        }
    }

    /// Replace the header resolver, e.g. one extended with extra aliases.
    pub fn with_resolver(mut self, resolver: HeaderResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full import.
    ///
    /// 1. Locate the header row (fatal when missing).
    /// 2. Resolve headers to canonical keys.
    /// 3. Normalise and enrich every non-blank data row, at most
    ///    `concurrency` at a time, keeping source order.
    /// 4. Apply the failure policy and build the report.
    pub async fn import(&self, rows: &[Vec<String>]) -> Result<RecordSet> {
        let started = std::time::Instant::now();

        // ── Step 1: Header row ────────────────────────────────────────────────
        let header_idx = HeaderResolver::find_header_row(rows, &self.config.anchor)?;
        let headers = self.resolver.resolve_all(&rows[header_idx]);
        debug!(
            "Header row at {} with {} columns ({} unmapped)",
            header_idx,
            headers.len(),
            headers.unmapped.len()
        );

        // ── Step 2: Rows ──────────────────────────────────────────────────────
        let data = &rows[header_idx + 1..];
        let blank_rows = data.iter().filter(|r| RowNormalizer::is_blank(r)).count();

        let enricher = self.enricher.as_ref();
        let headers_ref = &headers;
        let pending: Vec<usize> = data
            .iter()
            .enumerate()
            .filter(|(_, row)| !RowNormalizer::is_blank(row))
            .map(|(index, _)| index)
            .collect();
        let outcomes: Vec<_> = stream::iter(pending)
        .map(|index: usize| async move {
            let row = &data[index];
            let record = RowNormalizer::normalize(row, headers_ref, index);
            let input = EnrichmentInput::from_record(&record);
            let result = enricher.enrich(&input).await;
            (index, record, result)
        })
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;

        // ── Step 3: Failure policy ────────────────────────────────────────────
        let mut records = Vec::with_capacity(outcomes.len());
        let mut dropped = Vec::new();
        for (index, record, result) in outcomes {
            match result {
                Ok(enrichment) => records.push(enrichment.apply_to(&record)),
                Err(e) => {
                    warn!(
                        "Row {} enrichment via {} failed: {}",
                        index,
                        self.enricher.name(),
                        e
                    );
                    dropped.push(DroppedRow {
                        index,
                        reason: e.to_string(),
                    });
                    if self.config.failure_policy == EnrichmentFailurePolicy::Keep {
                        records.push(record);
                    }
                }
            }
        }

        // ── Step 4: Report ────────────────────────────────────────────────────
        let report = ImportReport {
            generated_at: Utc::now().to_rfc3339(),
            header_row_index: header_idx,
            data_rows: data.len(),
            blank_rows,
            imported: records.len(),
            dropped,
            unmapped_headers: headers.unmapped.clone(),
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            "Imported {} records ({} data rows, {} blank, {} enrichment failures) in {:.3}s",
            report.imported,
            report.data_rows,
            report.blank_rows,
            report.dropped.len(),
            report.elapsed_seconds
        );

        Ok(RecordSet { records, report })
    }
}
