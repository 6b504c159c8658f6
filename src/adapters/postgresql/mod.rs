//! PostgreSQL integration
//!
//! This module reads raw ExplanationOfBenefit resources from a staging table
//! and appends curated records to destination tables. Both sides share one
//! pooled [`PostgreSQLClient`].

pub mod adapter;
pub mod client;

pub use adapter::{PostgreSQLSink, PostgreSQLSource};
pub use client::PostgreSQLClient;
