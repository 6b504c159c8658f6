//! Newline-delimited JSON collaborators
//!
//! [`FileSource`] reads one staging row per line, an object holding the id and
//! the resource under the configured column names:
//!
//! ```text
//! {"explanationofbenefit_id": "eob-1", "resource": {"resourceType": "ExplanationOfBenefit"}}
//! ```
//!
//! [`FileSink`] appends one curated row per line to `<output_dir>/<table>.ndjson`.

use crate::adapters::traits::{AppendResult, RecordBatches, RecordSink, RecordSource};
use crate::config::SourceConfig;
use crate::domain::ids::TableName;
use crate::domain::{EtlError, RawRecord, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};

/// NDJSON staging file reader
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    id_column: String,
    resource_column: String,
}

enum Cursor {
    Unopened,
    Open { lines: Lines<BufReader<File>>, line: usize },
    Done,
}

impl FileSource {
    /// Create a source over the configured file
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let path = config
            .path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                EtlError::Configuration("source.path is required for file sources".to_string())
            })?;

        Ok(Self {
            path: PathBuf::from(path),
            id_column: config.id_column.clone(),
            resource_column: config.resource_column.clone(),
        })
    }

    async fn open(&self) -> Result<Lines<BufReader<File>>> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| EtlError::Source(format!("{}: {e}", self.path.display())))?;
        Ok(BufReader::new(file).lines())
    }

    /// Read up to `batch_size` records; `None` once the file is exhausted
    async fn read_batch(
        &self,
        lines: &mut Lines<BufReader<File>>,
        line: &mut usize,
        batch_size: usize,
    ) -> Result<Option<Vec<RawRecord>>> {
        let mut batch = Vec::with_capacity(batch_size);

        while batch.len() < batch_size {
            let Some(text) = lines
                .next_line()
                .await
                .map_err(|e| EtlError::Source(format!("{}: {e}", self.path.display())))?
            else {
                break;
            };
            *line += 1;

            if text.trim().is_empty() {
                continue;
            }
            batch.push(self.parse_line(&text, *line));
        }

        Ok((!batch.is_empty()).then_some(batch))
    }

    /// Parse one line into a raw record
    ///
    /// A line that is not a JSON object is kept as text under a `line <n>` id,
    /// so the batch driver counts it as an undecodable record. A missing or
    /// non-scalar id becomes a blank id, which the batch driver skips.
    fn parse_line(&self, text: &str, line: usize) -> RawRecord {
        let mut row = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(row)) => row,
            Ok(_) | Err(_) => return RawRecord::from_text(format!("line {line}"), text),
        };

        let id = match row.get(&self.id_column) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        let document = row.remove(&self.resource_column).unwrap_or(Value::Null);

        RawRecord::new(id, document)
    }
}

#[async_trait]
impl RecordSource for FileSource {
    async fn test_connection(&self) -> Result<()> {
        fs::metadata(&self.path)
            .await
            .map_err(|e| EtlError::Source(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }

    fn fetch_batches(&self, batch_size: usize) -> RecordBatches<'_> {
        stream::unfold(Cursor::Unopened, move |cursor| async move {
            let (mut lines, mut line) = match cursor {
                Cursor::Done => return None,
                Cursor::Open { lines, line } => (lines, line),
                Cursor::Unopened => match self.open().await {
                    Ok(lines) => (lines, 0),
                    Err(e) => return Some((Err(e), Cursor::Done)),
                },
            };

            match self.read_batch(&mut lines, &mut line, batch_size).await {
                Ok(Some(batch)) => Some((Ok(batch), Cursor::Open { lines, line })),
                Ok(None) => None,
                Err(e) => Some((Err(e), Cursor::Done)),
            }
        })
        .boxed()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// NDJSON curated file writer
#[derive(Debug, Clone)]
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    /// Create a sink writing under `output_dir`
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// File holding the rows of a table
    pub fn table_path(&self, table: &TableName) -> PathBuf {
        self.output_dir.join(format!("{table}.ndjson"))
    }
}

#[async_trait]
impl RecordSink for FileSink {
    async fn test_connection(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| EtlError::Sink(format!("{}: {e}", self.output_dir.display())))
    }

    async fn append(
        &self,
        table: &TableName,
        rows: Vec<Value>,
        dry_run: bool,
    ) -> Result<AppendResult> {
        let path = self.table_path(table);

        if dry_run {
            tracing::info!(
                path = %path.display(),
                count = rows.len(),
                "DRY RUN: Would append {} rows",
                rows.len()
            );
            return Ok(AppendResult::dry_run(rows.len()));
        }

        let mut buffer = Vec::new();
        for row in &rows {
            serde_json::to_writer(&mut buffer, row)?;
            buffer.push(b'\n');
        }

        let sink_error = |e: std::io::Error| EtlError::Sink(format!("{}: {e}", path.display()));

        fs::create_dir_all(&self.output_dir).await.map_err(sink_error)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(sink_error)?;
        file.write_all(&buffer).await.map_err(sink_error)?;
        file.flush().await.map_err(sink_error)?;

        tracing::debug!(path = %path.display(), rows = rows.len(), "Rows appended");
        Ok(AppendResult::written(rows.len()))
    }

    fn describe(&self) -> String {
        self.output_dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DecodeError;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn source_config(path: &Path) -> SourceConfig {
        SourceConfig {
            kind: crate::config::CollaboratorKind::File,
            batch_size: 2,
            staging_table: "fhir_staging.explanationofbenefits".to_string(),
            id_column: "id".to_string(),
            resource_column: "resource".to_string(),
            path: Some(path.display().to_string()),
        }
    }

    #[test]
    fn test_parse_line() {
        let source = FileSource::new(&source_config(Path::new("staging.ndjson"))).unwrap();

        let record = source
            .parse_line(r#"{"id": 7, "resource": {"resourceType": "ExplanationOfBenefit"}}"#, 1);
        assert_eq!(record.id, "7");
        assert_eq!(record.document["resourceType"], "ExplanationOfBenefit");

        let missing = source.parse_line(r#"{"resource": "{}"}"#, 2);
        assert_eq!(missing.id, "");
        assert_eq!(missing.document, json!("{}"));

    }

    #[test]
    fn test_non_object_lines_stay_countable() {
        let source = FileSource::new(&source_config(Path::new("staging.ndjson"))).unwrap();

        let array = source.parse_line("[1, 2]", 3);
        assert_eq!(array.id, "line 3");
        assert!(matches!(array.decode(), Err(DecodeError::NotAnObject(_))));

        let garbage = source.parse_line("not json", 4);
        assert_eq!(garbage.id, "line 4");
        assert!(matches!(garbage.decode(), Err(DecodeError::NotJson(_))));
    }

    #[test]
    fn test_source_requires_path() {
        let mut config = source_config(Path::new("x"));
        config.path = None;
        assert!(matches!(
            FileSource::new(&config),
            Err(EtlError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_batches_pages_and_skips_blank_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"id": "a", "resource": {{}}}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"id": "b", "resource": {{}}}}"#).unwrap();
        writeln!(file, r#"{{"id": "c", "resource": {{}}}}"#).unwrap();
        file.flush().unwrap();

        let source = FileSource::new(&source_config(file.path())).unwrap();
        let batches: Vec<Vec<RawRecord>> = source.fetch_batches(2).try_collect().await.unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1][0].id, "c");
    }

    #[tokio::test]
    async fn test_missing_file_is_source_error() {
        let source = FileSource::new(&source_config(Path::new("/nonexistent/eobs.ndjson"))).unwrap();
        let batches: Vec<Result<Vec<RawRecord>>> = source.fetch_batches(10).collect().await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(EtlError::Source(_))));
        assert!(source.test_connection().await.is_err());
    }

    #[tokio::test]
    async fn test_sink_appends_and_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = FileSink::new(dir.path().join("curated"));
        let table = TableName::new("fhir_curated.eob_items").unwrap();

        let dry = sink.append(&table, vec![json!({"a": 1})], true).await.unwrap();
        assert_eq!(dry, AppendResult::dry_run(1));
        assert!(!sink.table_path(&table).exists());

        sink.append(&table, vec![json!({"a": 1})], false).await.unwrap();
        let result = sink
            .append(&table, vec![json!({"a": 2}), json!({"a": 3})], false)
            .await
            .unwrap();
        assert_eq!(result, AppendResult::written(2));

        let contents = std::fs::read_to_string(sink.table_path(&table)).unwrap();
        assert_eq!(contents, "{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n");
    }
}
