//! Collaborator factory
//!
//! This module builds the source and sink selected by configuration. When
//! both are PostgreSQL-backed they share one connection pool.

use crate::adapters::file::{FileSink, FileSource};
use crate::adapters::postgresql::{PostgreSQLClient, PostgreSQLSink, PostgreSQLSource};
use crate::adapters::traits::{RecordSink, RecordSource};
use crate::config::{CollaboratorKind, EobCuratorConfig};
use crate::domain::{EtlError, Result};
use std::sync::Arc;

/// Source and sink built from one configuration
pub struct Collaborators {
    pub source: Arc<dyn RecordSource>,
    pub sink: Arc<dyn RecordSink>,
}

/// Create both collaborators, sharing the PostgreSQL client when possible
///
/// # Errors
///
/// Returns an error if a collaborator cannot be created
pub fn create_collaborators(config: &EobCuratorConfig) -> Result<Collaborators> {
    let client = if config.uses_postgresql() {
        Some(Arc::new(postgresql_client(config)?))
    } else {
        None
    };

    Ok(Collaborators {
        source: build_source(config, client.clone())?,
        sink: build_sink(config, client)?,
    })
}

/// Create the record source selected by `source.kind`
///
/// # Errors
///
/// Returns an error if the source cannot be created
pub fn create_source(config: &EobCuratorConfig) -> Result<Arc<dyn RecordSource>> {
    let client = match config.source.kind {
        CollaboratorKind::PostgreSQL => Some(Arc::new(postgresql_client(config)?)),
        CollaboratorKind::File => None,
    };
    build_source(config, client)
}

/// Create the record sink selected by `sink.kind`
///
/// # Errors
///
/// Returns an error if the sink cannot be created
pub fn create_sink(config: &EobCuratorConfig) -> Result<Arc<dyn RecordSink>> {
    let client = match config.sink.kind {
        CollaboratorKind::PostgreSQL => Some(Arc::new(postgresql_client(config)?)),
        CollaboratorKind::File => None,
    };
    build_sink(config, client)
}

fn postgresql_client(config: &EobCuratorConfig) -> Result<PostgreSQLClient> {
    let pg_config = config.postgresql.as_ref().ok_or_else(|| {
        EtlError::Configuration("postgresql configuration is required".to_string())
    })?;

    tracing::info!("Creating PostgreSQL client");
    PostgreSQLClient::new(pg_config.clone())
}

fn build_source(
    config: &EobCuratorConfig,
    client: Option<Arc<PostgreSQLClient>>,
) -> Result<Arc<dyn RecordSource>> {
    match (config.source.kind, client) {
        (CollaboratorKind::PostgreSQL, Some(client)) => {
            Ok(Arc::new(PostgreSQLSource::new(client, &config.source)?))
        }
        (CollaboratorKind::PostgreSQL, None) => Err(EtlError::Configuration(
            "postgresql configuration is required".to_string(),
        )),
        (CollaboratorKind::File, _) => {
            tracing::info!("Creating NDJSON file source");
            Ok(Arc::new(FileSource::new(&config.source)?))
        }
    }
}

fn build_sink(
    config: &EobCuratorConfig,
    client: Option<Arc<PostgreSQLClient>>,
) -> Result<Arc<dyn RecordSink>> {
    match (config.sink.kind, client) {
        (CollaboratorKind::PostgreSQL, Some(client)) => Ok(Arc::new(PostgreSQLSink::new(client))),
        (CollaboratorKind::PostgreSQL, None) => Err(EtlError::Configuration(
            "postgresql configuration is required".to_string(),
        )),
        (CollaboratorKind::File, _) => {
            let output_dir = config.sink.output_dir.as_deref().ok_or_else(|| {
                EtlError::Configuration("sink.output_dir is required for file sinks".to_string())
            })?;
            tracing::info!(output_dir, "Creating NDJSON file sink");
            Ok(Arc::new(FileSink::new(output_dir)))
        }
    }
}
