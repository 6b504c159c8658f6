//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Plain or JSON console output
//! - Configurable log levels, overridable with `RUST_LOG`
//! - Local JSON file logging with rotation
//!
//! The macros below keep field names consistent between the batch driver and
//! the pipeline coordinator, so log queries can rely on `eob_id`, `error_kind`
//! and `target`.
//!
//! # Example
//!
//! ```no_run
//! use eob_curator::logging::init_logging;
//! use eob_curator::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log an item or contained entry that was dropped during flattening
///
/// # Example
///
/// ```no_run
/// use eob_curator::log_entry_dropped;
/// use eob_curator::domain::ExtractionError;
///
/// let error = ExtractionError::NotAnObject("a number");
/// log_entry_dropped!("items", "eob-1", 3, &error);
/// ```
#[macro_export]
macro_rules! log_entry_dropped {
    ($rule:expr, $eob_id:expr, $index:expr, $error:expr) => {
        tracing::warn!(
            rule = $rule,
            eob_id = %$eob_id,
            index = $index,
            error_kind = $error.kind(),
            error = %$error,
            "Dropped entry during flattening"
        );
    };
}

/// Log a raw record that could not be used at all
///
/// # Example
///
/// ```no_run
/// use eob_curator::log_record_skipped;
/// use eob_curator::domain::DecodeError;
///
/// let error = DecodeError::NotJson("EOF while parsing".to_string());
/// log_record_skipped!("eob-1", error.kind(), &error);
/// ```
#[macro_export]
macro_rules! log_record_skipped {
    ($eob_id:expr, $kind:expr, $error:expr) => {
        tracing::warn!(
            eob_id = %$eob_id,
            error_kind = $kind,
            error = %$error,
            "Skipped unusable record"
        );
    };
}

/// Log the outcome of one batch for one target
///
/// # Example
///
/// ```no_run
/// use eob_curator::log_batch_processed;
///
/// log_batch_processed!("items", 1, 5000, 21034, 2);
/// ```
#[macro_export]
macro_rules! log_batch_processed {
    ($target:expr, $batch:expr, $records_in:expr, $records_out:expr, $dropped:expr) => {
        tracing::info!(
            target_table = %$target,
            batch = $batch,
            records_in = $records_in,
            records_out = $records_out,
            entries_dropped = $dropped,
            "Batch {} processed successfully",
            $batch
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use eob_curator::log_error_with_context;
/// use eob_curator::domain::EtlError;
///
/// let error = EtlError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{DecodeError, EtlError, ExtractionError};

    #[test]
    fn test_macros_expand_without_subscriber() {
        let dropped = ExtractionError::NotAnObject("a number");
        crate::log_entry_dropped!("items", "eob-1", 0, &dropped);

        let skipped = DecodeError::NotJson("eof".to_string());
        crate::log_record_skipped!("eob-2", skipped.kind(), &skipped);

        crate::log_batch_processed!("coverage", 1, 10, 12, 0);

        let error = EtlError::Other("boom".to_string());
        crate::log_error_with_context!(&error, "testing");
    }
}
