//! Batch driver
//!
//! Applies a flattening rule across a page-batch of raw records and
//! aggregates the per-record outputs. The driver performs no I/O: it decodes
//! each document once, runs the rule, logs and counts whatever was dropped,
//! and returns the flat records in input order.

use crate::core::transform::resolve::list_of;
use crate::core::transform::{coverage::COVERAGE, FlattenRule};
use crate::domain::ids::EobId;
use crate::domain::raw::{is_explanation_of_benefit, resource_type, Document, RawRecord};
use crate::{log_entry_dropped, log_record_skipped};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;

/// Maximum number of error messages kept per result
pub const MAX_RECORDED_ERRORS: usize = 100;

/// Counts for one rule over one or more batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Raw records read
    pub records_in: usize,
    /// Flat records produced
    pub records_out: usize,
    /// Raw records skipped (undecodable, missing id or wrong resource type)
    pub records_skipped: usize,
    /// Items or contained entries dropped during extraction
    pub entries_dropped: usize,
    /// First [`MAX_RECORDED_ERRORS`] error messages
    pub errors: Vec<String>,
}

impl BatchResult {
    /// Create a new empty batch result
    pub fn new() -> Self {
        Self {
            records_in: 0,
            records_out: 0,
            records_skipped: 0,
            entries_dropped: 0,
            errors: Vec::new(),
        }
    }

    /// Count a skipped raw record
    pub fn add_skipped(&mut self, error: Option<String>) {
        self.records_skipped += 1;
        if let Some(error) = error {
            self.record_error(error);
        }
    }

    /// Count a dropped entry
    pub fn add_dropped(&mut self, error: String) {
        self.entries_dropped += 1;
        self.record_error(error);
    }

    /// Whether every entry of every record was flattened
    pub fn is_clean(&self) -> bool {
        self.entries_dropped == 0 && self.errors.is_empty()
    }

    /// Merge another batch result into this one
    pub fn merge(&mut self, other: BatchResult) {
        self.records_in += other.records_in;
        self.records_out += other.records_out;
        self.records_skipped += other.records_skipped;
        self.entries_dropped += other.entries_dropped;
        for error in other.errors {
            self.record_error(error);
        }
    }

    fn record_error(&mut self, error: String) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(error);
        }
    }
}

impl Default for BatchResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat records of a batch plus their counts
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub records: Vec<T>,
    pub result: BatchResult,
}

/// A batch whose documents have been decoded once
///
/// Decoded documents borrow from the raw batch when the staging layer stored
/// objects, and own the parsed value when it stored JSON text.
#[derive(Debug)]
pub struct DecodedBatch<'a> {
    documents: Vec<(EobId, Cow<'a, Document>)>,
    result: BatchResult,
}

impl<'a> DecodedBatch<'a> {
    /// Number of usable documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Counts accumulated while decoding
    pub fn result(&self) -> &BatchResult {
        &self.result
    }
}

/// Pre-flight counts of what a batch would produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EstimateResult {
    /// Raw records read
    pub records: usize,
    /// Records that are ExplanationOfBenefit documents
    pub explanation_of_benefits: usize,
    /// Entries of `item` arrays
    pub items: usize,
    /// Contained Coverage resources of ExplanationOfBenefit documents
    pub coverages: usize,
    /// Records whose document could not be decoded
    pub undecodable: usize,
}

impl EstimateResult {
    pub fn merge(&mut self, other: EstimateResult) {
        self.records += other.records;
        self.explanation_of_benefits += other.explanation_of_benefits;
        self.items += other.items;
        self.coverages += other.coverages;
        self.undecodable += other.undecodable;
    }
}

/// Applies flattening rules to batches of raw records
#[derive(Debug, Clone, Default)]
pub struct BatchDriver {
    load_time: Option<DateTime<Utc>>,
}

impl BatchDriver {
    /// Driver stamping records with the time each batch is transformed
    pub fn new() -> Self {
        Self { load_time: None }
    }

    /// Driver stamping every record with a fixed load time
    pub fn with_load_time(load_time: DateTime<Utc>) -> Self {
        Self {
            load_time: Some(load_time),
        }
    }

    /// Decode every document of a batch once
    ///
    /// Records with a blank id or an unusable document are logged, counted as
    /// skipped and left out of the decoded batch.
    pub fn decode<'a>(&self, batch: &'a [RawRecord]) -> DecodedBatch<'a> {
        let mut result = BatchResult::new();
        result.records_in = batch.len();
        let mut documents = Vec::with_capacity(batch.len());

        for record in batch {
            let eob_id = match EobId::new(record.id.as_str()) {
                Ok(eob_id) => eob_id,
                Err(e) => {
                    log_record_skipped!(&record.id, "missing_id", &e);
                    result.add_skipped(Some(format!("record '{}': {}", record.id, e)));
                    continue;
                }
            };

            match record.decode() {
                Ok(document) => documents.push((eob_id, document)),
                Err(e) => {
                    log_record_skipped!(&eob_id, e.kind(), &e);
                    result.add_skipped(Some(format!("{eob_id}: {e}")));
                }
            }
        }

        DecodedBatch { documents, result }
    }

    /// Apply a rule to an already decoded batch
    pub fn apply_decoded<R: FlattenRule>(
        &self,
        rule: &R,
        decoded: &DecodedBatch<'_>,
    ) -> BatchOutcome<R::Output> {
        let loaded_at = self.load_time.unwrap_or_else(Utc::now);
        let mut result = decoded.result.clone();
        let mut records = Vec::new();

        for (eob_id, document) in &decoded.documents {
            let output = rule.flatten(eob_id, document, loaded_at);

            if output.skipped {
                result.add_skipped(None);
            }

            for dropped in output.dropped {
                log_entry_dropped!(rule.name(), eob_id, dropped.index, &dropped.error);
                result.add_dropped(format!(
                    "{eob_id} {}[{}]: {}",
                    rule.name(),
                    dropped.index,
                    dropped.error
                ));
            }

            records.extend(output.records);
        }

        result.records_out = records.len();
        BatchOutcome { records, result }
    }

    /// Decode a batch and apply a rule to it
    ///
    /// Output order is input record order, then the rule's own order within
    /// each record.
    pub fn apply<R: FlattenRule>(&self, rule: &R, batch: &[RawRecord]) -> BatchOutcome<R::Output> {
        self.apply_decoded(rule, &self.decode(batch))
    }

    /// Count EOBs, items and contained Coverage resources without flattening
    pub fn estimate(&self, batch: &[RawRecord]) -> EstimateResult {
        let mut estimate = EstimateResult {
            records: batch.len(),
            ..Default::default()
        };

        for record in batch {
            let Ok(document) = record.decode() else {
                estimate.undecodable += 1;
                continue;
            };

            estimate.items += list_of(document.get("item")).value.len();

            if is_explanation_of_benefit(&document) {
                estimate.explanation_of_benefits += 1;
                estimate.coverages += list_of(document.get("contained"))
                    .value
                    .iter()
                    .filter_map(|entry| entry.as_object())
                    .filter(|entry| resource_type(entry) == Some(COVERAGE))
                    .count();
            }
        }

        estimate
    }
}
