//! Collaborators around the flattening core.
//!
//! This module provides the source and sink the pipeline coordinator drives:
//!
//! - [`traits`] - [`RecordSource`] and [`RecordSink`], the only seams the coordinator knows
//! - [`postgresql`] - Staging table reader and curated table writer over a shared pool
//! - [`file`] - Newline-delimited JSON reader and writer
//! - [`factory`] - Builds the collaborators selected by configuration
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind traits so the coordinator can be
//! tested with in-memory implementations.
//!
//! ```rust,no_run
//! use eob_curator::adapters::create_collaborators;
//! use eob_curator::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("eob-curator.toml")?;
//! let collaborators = create_collaborators(&config)?;
//!
//! collaborators.source.test_connection().await?;
//! println!("Reading from {}", collaborators.source.describe());
//! # Ok(())
//! # }
//! ```

pub mod factory;
pub mod file;
pub mod postgresql;
pub mod traits;

pub use factory::{create_collaborators, create_sink, create_source, Collaborators};
pub use traits::{AppendResult, RecordBatches, RecordSink, RecordSource};
