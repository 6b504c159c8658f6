//! Domain models and types for eob-curator.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Raw input** ([`RawRecord`]): one staging row, decoded lazily
//! - **Curated output** ([`FlatItemRecord`], [`FlatCoverageRecord`]) and their nested value types
//! - **Strongly-typed identifiers** ([`EobId`], [`TableName`])
//! - **Error types** ([`EtlError`], [`DecodeError`], [`ExtractionError`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use eob_curator::domain::RawRecord;
//! use serde_json::json;
//!
//! let record = RawRecord::new("eob-1", json!({"resourceType": "ExplanationOfBenefit"}));
//! let document = record.decode().unwrap();
//! assert_eq!(document["resourceType"], "ExplanationOfBenefit");
//! ```

pub mod errors;
pub mod ids;
pub mod raw;
pub mod records;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{DecodeError, EtlError, ExtractionError};
pub use ids::{EobId, TableName};
pub use raw::{Document, RawRecord};
pub use records::{
    AdjudicationEntry, Coding, FlatCoverageRecord, FlatItemRecord, IdentifierEntry, Money,
    ProductCoding, ServicePeriod,
};
pub use result::Result;
