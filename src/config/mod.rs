//! Configuration management for eob-curator.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! eob-curator uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `EOB_CURATOR_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use eob_curator::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("eob-curator.toml")?;
//!
//! println!("Staging table: {}", config.source.staging_table);
//! println!("Batch size: {}", config.source.batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`SourceConfig`] - Where raw EOB documents come from
//! - [`SinkConfig`] - Where curated records go
//! - [`PostgreSQLConfig`] - Connection pool settings
//! - [`PipelineConfig`] - Targets and shutdown behaviour
//! - [`LoggingConfig`] - Console and file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [source]
//! kind = "postgresql"
//! staging_table = "fhir_staging.explanationofbenefits"
//! batch_size = 5000
//!
//! [sink]
//! kind = "postgresql"
//! items_table = "fhir_curated.eob_items"
//! coverage_table = "fhir_curated.eob_coverage"
//!
//! [postgresql]
//! connection_string = "${EOB_CURATOR_DATABASE_URL}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CollaboratorKind, Environment, EobCuratorConfig, LoggingConfig,
    PipelineConfig, PostgreSQLConfig, SinkConfig, SourceConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
