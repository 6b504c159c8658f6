//! PostgreSQL adapters implementing the collaborator traits
//!
//! [`PostgreSQLSource`] reads the staging table through one server-side
//! cursor inside a read-only transaction, fetching a page-batch at a time.
//! The staging table has no key and ids may repeat, so the scan is a single
//! query rather than per-page queries keyed on the id.
//! [`PostgreSQLSink`] appends one batch per statement through
//! `jsonb_populate_recordset`, so the JSON keys of a flat record must match
//! the destination table's column names.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::traits::{AppendResult, RecordBatches, RecordSink, RecordSource};
use crate::config::SourceConfig;
use crate::domain::ids::TableName;
use crate::domain::{EtlError, RawRecord, Result};
use async_trait::async_trait;
use deadpool_postgres::Object;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_postgres::Row;

/// Name of the staging cursor; one per connection
const CURSOR_NAME: &str = "eob_curator_staging";

/// Staging table reader
pub struct PostgreSQLSource {
    client: Arc<PostgreSQLClient>,
    table: TableName,
    declare: String,
}

impl PostgreSQLSource {
    /// Create a source over the configured staging table
    ///
    /// # Errors
    ///
    /// Returns an error if the staging table name is invalid.
    pub fn new(client: Arc<PostgreSQLClient>, config: &SourceConfig) -> Result<Self> {
        let table = TableName::new(config.staging_table.as_str())
            .map_err(|e| EtlError::Configuration(format!("source.staging_table: {e}")))?;
        let declare = declare_cursor(&table, &config.id_column, &config.resource_column);

        Ok(Self {
            client,
            table,
            declare,
        })
    }

    /// Check out a connection and open the staging cursor on it
    async fn open_cursor(&self, batch_size: usize) -> Result<StagingCursor> {
        let conn = self.client.get_connection().await?;
        let cursor = StagingCursor {
            conn: Some(conn),
            table: self.table.clone(),
            fetch: fetch_statement(batch_size),
        };

        cursor
            .batch_execute(&format!("BEGIN READ ONLY; {}", self.declare))
            .await?;
        tracing::debug!(table = %self.table, batch_size, "Staging cursor opened");
        Ok(cursor)
    }
}

/// Single ordered scan of the staging table
///
/// Rows sharing an id all stay in the scan; a NULL id is read as blank.
fn declare_cursor(table: &TableName, id_column: &str, resource_column: &str) -> String {
    format!(
        "DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR \
         SELECT {id_column}::text, {resource_column}::text FROM {table} \
         ORDER BY {id_column}::text"
    )
}

fn fetch_statement(batch_size: usize) -> String {
    format!("FETCH FORWARD {batch_size} FROM {CURSOR_NAME}")
}

/// A short page means the cursor is exhausted
fn is_last_page(rows: usize, batch_size: usize) -> bool {
    rows < batch_size
}

fn raw_record(row: &Row) -> Result<RawRecord> {
    let id: Option<String> = row
        .try_get(0)
        .map_err(|e| EtlError::Source(format!("Failed to read id column: {e}")))?;
    let resource: Option<String> = row
        .try_get(1)
        .map_err(|e| EtlError::Source(format!("Failed to read resource column: {e}")))?;

    let id = id.unwrap_or_default();
    Ok(match resource {
        Some(text) => RawRecord::from_text(id, text),
        None => RawRecord::new(id, serde_json::Value::Null),
    })
}

/// Connection holding the open staging cursor
///
/// Dropped before [`StagingCursor::close`], the connection is detached from
/// the pool so its open transaction is never handed to another user.
struct StagingCursor {
    conn: Option<Object>,
    table: TableName,
    fetch: String,
}

impl StagingCursor {
    fn connection(&self) -> Result<&Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| EtlError::Source(format!("{}: staging cursor is closed", self.table)))
    }

    async fn batch_execute(&self, statement: &str) -> Result<()> {
        self.connection()?
            .batch_execute(statement)
            .await
            .map_err(|e| EtlError::Source(format!("{}: {e}", self.table)))
    }

    async fn fetch_page(&self) -> Result<Vec<RawRecord>> {
        let rows = self
            .connection()?
            .query(self.fetch.as_str(), &[])
            .await
            .map_err(|e| EtlError::Source(format!("{}: {e}", self.table)))?;

        rows.iter().map(raw_record).collect()
    }

    /// End the transaction and return the connection to the pool
    async fn close(mut self) {
        if let Err(e) = self.batch_execute("COMMIT").await {
            tracing::warn!(table = %self.table, error = %e, "Failed to close staging cursor");
            return;
        }
        self.conn.take();
    }
}

impl Drop for StagingCursor {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(Object::take(conn));
        }
    }
}

enum ScanState {
    Unopened,
    Open(StagingCursor),
    Done,
}

#[async_trait]
impl RecordSource for PostgreSQLSource {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    fn fetch_batches(&self, batch_size: usize) -> RecordBatches<'_> {
        stream::unfold(ScanState::Unopened, move |state| async move {
            let cursor = match state {
                ScanState::Done => return None,
                ScanState::Open(cursor) => cursor,
                ScanState::Unopened => match self.open_cursor(batch_size).await {
                    Ok(cursor) => cursor,
                    Err(e) => return Some((Err(e), ScanState::Done)),
                },
            };

            let page = match cursor.fetch_page().await {
                Ok(page) => page,
                Err(e) => return Some((Err(e), ScanState::Done)),
            };

            if !is_last_page(page.len(), batch_size) {
                return Some((Ok(page), ScanState::Open(cursor)));
            }

            cursor.close().await;
            if page.is_empty() {
                None
            } else {
                Some((Ok(page), ScanState::Done))
            }
        })
        .boxed()
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.table, self.client.connection_string_safe())
    }
}

/// Curated table writer
pub struct PostgreSQLSink {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLSink {
    /// Create a sink writing through the shared client
    pub fn new(client: Arc<PostgreSQLClient>) -> Self {
        Self { client }
    }
}

fn insert_statement(table: &TableName) -> String {
    format!("INSERT INTO {table} SELECT * FROM jsonb_populate_recordset(NULL::{table}, $1::jsonb)")
}

#[async_trait]
impl RecordSink for PostgreSQLSink {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn append(
        &self,
        table: &TableName,
        rows: Vec<serde_json::Value>,
        dry_run: bool,
    ) -> Result<AppendResult> {
        if dry_run {
            tracing::info!(
                table = %table,
                count = rows.len(),
                "DRY RUN: Would insert {} rows into PostgreSQL",
                rows.len()
            );
            return Ok(AppendResult::dry_run(rows.len()));
        }

        if rows.is_empty() {
            return Ok(AppendResult::written(0));
        }

        let payload = serde_json::Value::Array(rows);
        let inserted = self
            .client
            .execute(&insert_statement(table), &[&payload])
            .await
            .map_err(|e| EtlError::Sink(format!("{table}: {e}")))?;

        tracing::debug!(table = %table, rows = inserted, "Rows appended");
        Ok(AppendResult::written(inserted as usize))
    }

    fn describe(&self) -> String {
        self.client.connection_string_safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_cursor_scans_without_id_predicate() {
        let table = TableName::new("fhir_staging.explanationofbenefits").unwrap();
        let declare = declare_cursor(&table, "explanationofbenefit_id", "resource");

        assert_eq!(
            declare,
            "DECLARE eob_curator_staging NO SCROLL CURSOR FOR \
             SELECT explanationofbenefit_id::text, resource::text \
             FROM fhir_staging.explanationofbenefits \
             ORDER BY explanationofbenefit_id::text"
        );
        assert!(!declare.contains("WHERE"));
    }

    #[test]
    fn test_fetch_statement() {
        assert_eq!(
            fetch_statement(500),
            "FETCH FORWARD 500 FROM eob_curator_staging"
        );
    }

    #[test]
    fn test_page_ending_on_duplicate_id_continues() {
        // Staging rows a, b, b paged two at a time: the first page ends on
        // the first "b", the second "b" must still be fetched
        let ids = ["a", "b", "b"];
        let batch_size = 2;

        let mut pages = Vec::new();
        let mut offset = 0;
        loop {
            let page: Vec<_> = ids.iter().skip(offset).take(batch_size).collect();
            offset += page.len();
            let last = is_last_page(page.len(), batch_size);
            if !page.is_empty() {
                pages.push(page);
            }
            if last {
                break;
            }
        }

        assert_eq!(pages, vec![vec![&"a", &"b"], vec![&"b"]]);
    }

    #[test]
    fn test_full_page_is_not_last() {
        assert!(!is_last_page(2, 2));
        assert!(is_last_page(1, 2));
        assert!(is_last_page(0, 2));
    }

    #[test]
    fn test_insert_statement() {
        let table = TableName::new("fhir_curated.eob_items").unwrap();
        assert_eq!(
            insert_statement(&table),
            "INSERT INTO fhir_curated.eob_items SELECT * FROM \
             jsonb_populate_recordset(NULL::fhir_curated.eob_items, $1::jsonb)"
        );
    }
}
