// eob-curator - FHIR ExplanationOfBenefit flattening ETL
// Copyright (c) 2025 eob-curator Contributors
// Licensed under the MIT License

//! # eob-curator - FHIR ExplanationOfBenefit flattening ETL
//!
//! eob-curator reads staged FHIR ExplanationOfBenefit resources and flattens
//! their line items and contained Coverage resources into row-shaped records
//! for analytical tables.
//!
//! ## Overview
//!
//! This library provides:
//! - **Flattening rules** that turn one EOB into zero or more flat records,
//!   tolerating FHIR's polymorphic fields (single object or list)
//! - **A batch driver** that applies a rule to a page of raw records, counting
//!   and logging what it had to skip
//! - **Collaborators** reading from and writing to PostgreSQL or NDJSON files
//! - **A pipeline coordinator** with dry run and graceful shutdown
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Flattening rules, batch driver and pipeline coordinator
//! - [`adapters`] - Record sources and sinks
//! - [`domain`] - Raw and flat record types, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust
//! use eob_curator::core::transform::{flatten_coverage, flatten_items};
//! use eob_curator::domain::RawRecord;
//! use serde_json::json;
//!
//! let batch = vec![RawRecord::new(
//!     "eob-1",
//!     json!({
//!         "resourceType": "ExplanationOfBenefit",
//!         "insurance": [{"focal": true, "coverage": {"reference": "#cov-1"}}],
//!         "contained": [{"resourceType": "Coverage", "id": "cov-1", "status": "active"}],
//!         "item": [{"sequence": 1, "net": {"value": 125.5, "currency": "USD"}}]
//!     }),
//! )];
//!
//! let items = flatten_items(&batch);
//! assert_eq!(items[0].net.value, Some(125.5));
//!
//! let coverages = flatten_coverage(&batch);
//! assert_eq!(coverages[0].focal, Some(true));
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`domain::Result`]. Problems with a single
//! record or entry never fail a batch: they are logged and counted in
//! [`core::export::BatchResult`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
