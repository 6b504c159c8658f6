//! Core business logic for eob-curator.
//!
//! # Modules
//!
//! - [`transform`] - Scalar coders, field resolvers and the flattening rules
//! - [`export`] - Batch driver, pipeline coordinator and run summary
//!
//! # Pipeline Workflow
//!
//! 1. **Read**: Pull a page-batch of raw records from the source
//! 2. **Decode**: Parse every document once; unusable records are skipped
//! 3. **Flatten**: Apply each target's rule (items, coverage) to the batch
//! 4. **Load**: Append non-empty outputs to the target tables
//! 5. **Report**: Log and return a run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use eob_curator::adapters::create_collaborators;
//! use eob_curator::config::load_config;
//! use eob_curator::core::export::{PipelineCoordinator, PipelineSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("eob-curator.toml")?;
//! let collaborators = create_collaborators(&config)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = PipelineCoordinator::new(
//!     PipelineSettings::from_config(&config)?,
//!     collaborators.source,
//!     collaborators.sink,
//!     shutdown_rx,
//! );
//!
//! let summary = coordinator.execute().await?;
//! println!("Records read: {}", summary.records_read);
//! println!("Records loaded: {}", summary.records_loaded());
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod transform;
