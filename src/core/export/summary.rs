//! Pipeline summary and reporting
//!
//! This module defines structures for tracking and reporting pipeline runs.

use super::batch::BatchResult;
use crate::core::transform::Target;
use crate::domain::EtlError;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Per-target totals of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    /// Target flattened for this table
    #[serde(serialize_with = "serialize_target")]
    pub target: Target,

    /// Destination table
    pub table: String,

    /// Flattening counts, merged over all batches
    pub result: BatchResult,

    /// Records the sink accepted
    pub records_loaded: usize,

    /// Batches with no output, not sent to the sink
    pub empty_batches: usize,

    /// Batches the sink failed to append
    pub failed_loads: usize,
}

impl TargetSummary {
    pub fn new(target: Target, table: impl Into<String>) -> Self {
        Self {
            target,
            table: table.into(),
            result: BatchResult::new(),
            records_loaded: 0,
            empty_batches: 0,
            failed_loads: 0,
        }
    }
}

fn serialize_target<S: serde::Serializer>(target: &Target, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(target.as_str())
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Identifier of the run, attached to every log line of the run
    pub run_id: Uuid,

    /// Page-batches read from the source
    pub batches: usize,

    /// Raw records read from the source
    pub records_read: usize,

    /// Totals per target, in processing order
    pub targets: Vec<TargetSummary>,

    /// Whether flattened records were discarded instead of loaded
    pub dry_run: bool,

    /// Whether the run stopped early on a shutdown signal
    pub interrupted: bool,

    /// Duration of the run
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,

    /// Errors raised by the source or the sink
    pub errors: Vec<PipelineError>,
}

fn serialize_duration<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl PipelineSummary {
    /// Create a new empty summary with a fresh run id
    pub fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            batches: 0,
            records_read: 0,
            targets: Vec::new(),
            dry_run,
            interrupted: false,
            duration: Duration::from_secs(0),
            errors: Vec::new(),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add an error
    pub fn add_error(&mut self, error: PipelineError) {
        self.errors.push(error);
    }

    /// Summary of one target, if it was processed
    pub fn target(&self, target: Target) -> Option<&TargetSummary> {
        self.targets.iter().find(|t| t.target == target)
    }

    /// Flat records produced across all targets
    pub fn records_out(&self) -> usize {
        self.targets.iter().map(|t| t.result.records_out).sum()
    }

    /// Flat records the sink accepted across all targets
    pub fn records_loaded(&self) -> usize {
        self.targets.iter().map(|t| t.records_loaded).sum()
    }

    /// Items or contained entries dropped across all targets
    pub fn entries_dropped(&self) -> usize {
        self.targets.iter().map(|t| t.result.entries_dropped).sum()
    }

    /// Check if the run was successful (nothing dropped, nothing failed)
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
            && !self.interrupted
            && self
                .targets
                .iter()
                .all(|t| t.failed_loads == 0 && t.result.entries_dropped == 0)
    }

    /// Loaded records as a percentage of produced records
    ///
    /// Dry runs load nothing and report 100%.
    pub fn success_rate(&self) -> f64 {
        let produced = self.records_out();
        if produced == 0 || self.dry_run {
            return 100.0;
        }
        (self.records_loaded() as f64 / produced as f64) * 100.0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            batches = self.batches,
            records_read = self.records_read,
            records_out = self.records_out(),
            records_loaded = self.records_loaded(),
            entries_dropped = self.entries_dropped(),
            dry_run = self.dry_run,
            interrupted = self.interrupted,
            duration_secs = self.duration.as_secs(),
            success_rate = format!("{:.2}%", self.success_rate()),
            "Pipeline completed"
        );

        for target in &self.targets {
            tracing::info!(
                run_id = %self.run_id,
                target_table = %target.target,
                table = %target.table,
                records_in = target.result.records_in,
                records_out = target.result.records_out,
                records_skipped = target.result.records_skipped,
                entries_dropped = target.result.entries_dropped,
                records_loaded = target.records_loaded,
                failed_loads = target.failed_loads,
                "Target totals"
            );
        }

        if !self.errors.is_empty() {
            tracing::warn!(
                run_id = %self.run_id,
                error_count = self.errors.len(),
                "Pipeline completed with errors"
            );
            for error in &self.errors {
                tracing::warn!(
                    error_type = ?error.error_type,
                    message = %error.message,
                    context = ?error.context,
                    "Pipeline error"
                );
            }
        }
    }
}

/// Type of pipeline error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineErrorType {
    /// Reading staging records failed
    Source,
    /// Appending curated records failed
    Sink,
    /// Flat records could not be turned into sink rows
    Serialization,
    /// Unknown error
    Unknown,
}

impl From<&EtlError> for PipelineErrorType {
    fn from(error: &EtlError) -> Self {
        match error {
            EtlError::Source(_) => Self::Source,
            EtlError::Sink(_) => Self::Sink,
            EtlError::Serialization(_) => Self::Serialization,
            _ => Self::Unknown,
        }
    }
}

/// Pipeline error with context
#[derive(Debug, Clone, Serialize)]
pub struct PipelineError {
    pub error_type: PipelineErrorType,
    pub message: String,
    /// Optional context (e.g., batch number, table)
    pub context: Option<String>,
}

impl PipelineError {
    /// Create a new pipeline error
    pub fn new(error_type: PipelineErrorType, message: String) -> Self {
        Self {
            error_type,
            message,
            context: None,
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_summary(target: Target, out: usize, loaded: usize) -> TargetSummary {
        let mut summary = TargetSummary::new(target, format!("curated.{target}"));
        summary.result.records_out = out;
        summary.records_loaded = loaded;
        summary
    }

    #[test]
    fn test_pipeline_summary_creation() {
        let summary = PipelineSummary::new(false);

        assert_eq!(summary.batches, 0);
        assert_eq!(summary.records_read, 0);
        assert!(summary.targets.is_empty());
        assert!(!summary.interrupted);
        assert_eq!(summary.duration, Duration::from_secs(0));
        assert!(summary.is_successful());
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(PipelineSummary::new(false).run_id, PipelineSummary::new(false).run_id);
    }

    #[test]
    fn test_pipeline_summary_with_duration() {
        let summary = PipelineSummary::new(false).with_duration(Duration::from_secs(120));
        assert_eq!(summary.duration, Duration::from_secs(120));
    }

    #[test]
    fn test_totals_and_success_rate() {
        let mut summary = PipelineSummary::new(false);
        summary.targets.push(target_summary(Target::Items, 80, 80));
        summary.targets.push(target_summary(Target::Coverage, 20, 15));

        assert_eq!(summary.records_out(), 100);
        assert_eq!(summary.records_loaded(), 95);
        assert_eq!(summary.success_rate(), 95.0);
        assert_eq!(summary.target(Target::Coverage).unwrap().records_loaded, 15);
    }

    #[test]
    fn test_dry_run_success_rate() {
        let mut summary = PipelineSummary::new(true);
        summary.targets.push(target_summary(Target::Items, 10, 0));
        assert_eq!(summary.success_rate(), 100.0);
    }

    #[test]
    fn test_is_successful() {
        let mut summary = PipelineSummary::new(false);
        summary.targets.push(target_summary(Target::Items, 10, 10));
        assert!(summary.is_successful());

        summary.targets[0].result.entries_dropped = 1;
        assert!(!summary.is_successful());

        summary.targets[0].result.entries_dropped = 0;
        summary.interrupted = true;
        assert!(!summary.is_successful());
    }

    #[test]
    fn test_pipeline_error_with_context() {
        let error = PipelineError::new(PipelineErrorType::Sink, "insert failed".to_string())
            .with_context("table=fhir_curated.eob_items".to_string());

        assert_eq!(error.error_type, PipelineErrorType::Sink);
        assert_eq!(error.context.as_deref(), Some("table=fhir_curated.eob_items"));
    }

    #[test]
    fn test_error_type_follows_error_kind() {
        let error = EtlError::Serialization("key must be a string".to_string());
        let error_type = PipelineErrorType::from(&error);

        assert_eq!(error_type, PipelineErrorType::Serialization);
        assert_eq!(serde_json::to_value(&error_type).unwrap(), "serialization");
        assert_eq!(
            PipelineErrorType::from(&EtlError::Sink("x".to_string())),
            PipelineErrorType::Sink
        );
        assert_eq!(
            PipelineErrorType::from(&EtlError::Other("x".to_string())),
            PipelineErrorType::Unknown
        );
    }

    #[test]
    fn test_summary_serializes() {
        let mut summary = PipelineSummary::new(false);
        summary.targets.push(target_summary(Target::Items, 1, 1));
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["targets"][0]["target"], "items");
        assert_eq!(value["duration"], 0.0);
    }
}
