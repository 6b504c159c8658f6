//! Pipeline coordinator - main orchestrator for a flattening run
//!
//! This module pulls page-batches from a [`RecordSource`], runs the batch
//! driver once per configured target, and hands the flat records to a
//! [`RecordSink`]. Batches are processed one at a time, so output order
//! follows source order.

use crate::adapters::traits::{RecordSink, RecordSource};
use crate::config::EobCuratorConfig;
use crate::core::export::batch::{BatchDriver, BatchResult, DecodedBatch, EstimateResult};
use crate::core::export::summary::{
    PipelineError, PipelineErrorType, PipelineSummary, TargetSummary,
};
use crate::core::transform::coverage::CoverageRule;
use crate::core::transform::items::ItemRule;
use crate::core::transform::{FlattenRule, Target};
use crate::domain::ids::TableName;
use crate::domain::{EtlError, RawRecord, Result};
use crate::log_batch_processed;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Settings of one run, resolved from configuration and CLI flags
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Targets in processing order with their destination tables
    pub targets: Vec<(Target, TableName)>,

    /// Raw records per page-batch
    pub batch_size: usize,

    /// Flatten without writing to the sink
    pub dry_run: bool,
}

impl PipelineSettings {
    /// Resolve settings from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown targets or invalid table names.
    pub fn from_config(config: &EobCuratorConfig) -> Result<Self> {
        let targets = config
            .pipeline
            .parsed_targets()
            .map_err(EtlError::Configuration)?
            .into_iter()
            .map(|target| {
                config
                    .sink
                    .table_for(target)
                    .map(|table| (target, table))
                    .map_err(|e| EtlError::Configuration(format!("{target} table: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            targets,
            batch_size: config.source.batch_size,
            dry_run: config.application.dry_run,
        })
    }
}

/// Pipeline coordinator
pub struct PipelineCoordinator {
    settings: PipelineSettings,
    source: Arc<dyn RecordSource>,
    sink: Arc<dyn RecordSink>,
    shutdown_signal: watch::Receiver<bool>,
    driver: BatchDriver,
}

impl PipelineCoordinator {
    /// Create a new pipeline coordinator
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn RecordSource>,
        sink: Arc<dyn RecordSink>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            source,
            sink,
            shutdown_signal,
            driver: BatchDriver::new(),
        }
    }

    /// Replace the batch driver, e.g. to pin the load timestamp
    pub fn with_driver(mut self, driver: BatchDriver) -> Self {
        self.driver = driver;
        self
    }

    /// Settings of this run
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Execute the pipeline
    ///
    /// For every page-batch read from the source:
    /// 1. Decodes each document once
    /// 2. For each target, flattens the batch and appends the output to the
    ///    target's table (batches with no output are not sent)
    /// 3. Stops before the next batch if a shutdown was requested
    ///
    /// Source and sink failures are recorded in the summary. A source failure
    /// ends the run; a sink failure only loses that batch for that target.
    pub async fn execute(&self) -> Result<PipelineSummary> {
        let start_time = Instant::now();
        let mut summary = PipelineSummary::new(self.settings.dry_run);
        summary.targets = self
            .settings
            .targets
            .iter()
            .map(|(target, table)| TargetSummary::new(*target, table.as_str()))
            .collect();

        tracing::info!(
            run_id = %summary.run_id,
            source = %self.source.describe(),
            sink = %self.sink.describe(),
            batch_size = self.settings.batch_size,
            dry_run = self.settings.dry_run,
            "Starting pipeline"
        );

        let mut batches = self.source.fetch_batches(self.settings.batch_size);

        loop {
            if self.shutdown_requested() {
                tracing::warn!(
                    run_id = %summary.run_id,
                    batches = summary.batches,
                    "Shutdown requested, stopping before the next batch"
                );
                summary.interrupted = true;
                break;
            }

            let page = match batches.next().await {
                Some(Ok(page)) => page,
                Some(Err(e)) => {
                    tracing::error!(run_id = %summary.run_id, error = %e, "Failed to read batch");
                    summary.add_error(
                        PipelineError::new(PipelineErrorType::Source, e.to_string())
                            .with_context(format!("batch={}", summary.batches + 1)),
                    );
                    break;
                }
                None => break,
            };

            summary.batches += 1;
            summary.records_read += page.len();
            self.process_batch(summary.batches, &page, &mut summary).await;
        }

        summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();

        Ok(summary)
    }

    /// Flatten and load one page-batch for every target
    async fn process_batch(&self, batch: usize, page: &[RawRecord], summary: &mut PipelineSummary) {
        let decoded = self.driver.decode(page);

        for (index, (target, table)) in self.settings.targets.iter().enumerate() {
            let (rows, result) = match target {
                Target::Items => self.flatten_rows(&ItemRule, &decoded),
                Target::Coverage => self.flatten_rows(&CoverageRule, &decoded),
            };

            log_batch_processed!(
                target,
                batch,
                result.records_in,
                result.records_out,
                result.entries_dropped
            );

            let target_summary = &mut summary.targets[index];
            target_summary.result.merge(result);

            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    target_summary.failed_loads += 1;
                    summary.add_error(
                        PipelineError::new(PipelineErrorType::from(&e), e.to_string())
                            .with_context(format!("batch={batch}, table={table}")),
                    );
                    continue;
                }
            };

            if rows.is_empty() {
                tracing::debug!(target_table = %target, batch, "No records to load");
                target_summary.empty_batches += 1;
                continue;
            }

            match self.sink.append(table, rows, self.settings.dry_run).await {
                Ok(appended) => {
                    if !appended.dry_run {
                        target_summary.records_loaded += appended.rows_written;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        target_table = %target,
                        table = %table,
                        batch,
                        error = %e,
                        "Failed to load batch"
                    );
                    target_summary.failed_loads += 1;
                    summary.add_error(
                        PipelineError::new(PipelineErrorType::Sink, e.to_string())
                            .with_context(format!("batch={batch}, table={table}")),
                    );
                }
            }
        }
    }

    /// Flatten a decoded batch into JSON rows for the sink
    fn flatten_rows<R: FlattenRule>(
        &self,
        rule: &R,
        decoded: &DecodedBatch<'_>,
    ) -> (Result<Vec<serde_json::Value>>, BatchResult) {
        let outcome = self.driver.apply_decoded(rule, decoded);
        let rows = outcome
            .records
            .iter()
            .map(|record| serde_json::to_value(record).map_err(EtlError::from))
            .collect();
        (rows, outcome.result)
    }
}

/// Count EOBs, items and contained Coverage resources in a source
///
/// Nothing is flattened or written. The shutdown signal is checked between
/// batches like [`PipelineCoordinator::execute`] does.
///
/// # Errors
///
/// Returns the first error raised by the source.
pub async fn estimate_source(
    source: &dyn RecordSource,
    batch_size: usize,
    shutdown_signal: &watch::Receiver<bool>,
) -> Result<EstimateResult> {
    let driver = BatchDriver::new();
    let mut estimate = EstimateResult::default();
    let mut batches = source.fetch_batches(batch_size);

    while !*shutdown_signal.borrow() {
        match batches.next().await {
            Some(page) => estimate.merge(driver.estimate(&page?)),
            None => break,
        }
    }

    tracing::info!(
        source = %source.describe(),
        records = estimate.records,
        explanation_of_benefits = estimate.explanation_of_benefits,
        items = estimate.items,
        coverages = estimate.coverages,
        undecodable = estimate.undecodable,
        "Estimate completed"
    );

    Ok(estimate)
}
