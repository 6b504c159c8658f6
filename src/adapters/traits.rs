//! Collaborator traits
//!
//! The coordinator only knows these traits. PostgreSQL and NDJSON files
//! implement both sides; tests inject in-memory implementations.

use crate::domain::ids::TableName;
use crate::domain::{RawRecord, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of page-batches produced by a [`RecordSource`]
pub type RecordBatches<'a> = BoxStream<'a, Result<Vec<RawRecord>>>;

/// Reads raw staging records in page-batches
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Test connectivity to the underlying store
    async fn test_connection(&self) -> Result<()>;

    /// Stream every staging record in batches of at most `batch_size`
    ///
    /// The stream is finite and yields records in a stable order. An `Err`
    /// item ends the run; calling again restarts from the beginning.
    fn fetch_batches(&self, batch_size: usize) -> RecordBatches<'_>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Appends curated rows to destination tables
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Test connectivity to the underlying store
    async fn test_connection(&self) -> Result<()>;

    /// Append rows to an existing table
    ///
    /// Append-only and at-least-once: rerunning a batch duplicates its rows.
    /// With `dry_run` nothing is written and every row is reported as written.
    async fn append(
        &self,
        table: &TableName,
        rows: Vec<serde_json::Value>,
        dry_run: bool,
    ) -> Result<AppendResult>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Result of one append call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendResult {
    /// Rows written, or that would have been written on a dry run
    pub rows_written: usize,

    /// Whether the write was skipped
    pub dry_run: bool,
}

impl AppendResult {
    /// Result of a dry-run append of `rows` rows
    pub fn dry_run(rows: usize) -> Self {
        Self {
            rows_written: rows,
            dry_run: true,
        }
    }

    /// Result of a real append of `rows` rows
    pub fn written(rows: usize) -> Self {
        Self {
            rows_written: rows,
            dry_run: false,
        }
    }
}
