//! Batch driving and pipeline orchestration
//!
//! This module provides:
//! - Batch driving of flattening rules over raw records
//! - Pipeline coordination between a source and a sink
//! - Summary and reporting

pub mod batch;
pub mod coordinator;
pub mod summary;

pub use batch::{BatchDriver, BatchOutcome, BatchResult, DecodedBatch, EstimateResult};
pub use coordinator::{estimate_source, PipelineCoordinator, PipelineSettings};
pub use summary::{PipelineError, PipelineErrorType, PipelineSummary, TargetSummary};
