//! Count command implementation
//!
//! Streams the source once and reports how many EOBs, items and contained
//! Coverage resources a run would flatten. Nothing is written.

use super::exit_code;
use crate::adapters::create_source;
use crate::config::load_config;
use crate::core::export::estimate_source;
use crate::domain::EtlError;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the count command
#[derive(Args, Debug)]
pub struct CountArgs {
    /// Override the number of raw records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl CountArgs {
    /// Execute the count command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        if let Some(batch_size) = self.batch_size {
            config.source.batch_size = batch_size;
            if let Err(e) = config.validate() {
                eprintln!("Configuration validation failed: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        }

        let source = match create_source(&config) {
            Ok(source) => source,
            Err(e @ EtlError::Configuration(_)) => {
                eprintln!("Failed to initialize source: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
            Err(e) => {
                eprintln!("Failed to initialize source: {e}");
                return Ok(exit_code::CONNECTION);
            }
        };

        if let Err(e) = source.test_connection().await {
            tracing::error!(error = %e, "Source connection test failed");
            eprintln!("Cannot reach source {}: {e}", source.describe());
            return Ok(exit_code::CONNECTION);
        }

        println!("Counting records in {}", source.describe());

        let estimate =
            match estimate_source(source.as_ref(), config.source.batch_size, &shutdown_signal)
                .await
            {
                Ok(estimate) => estimate,
                Err(e) => {
                    tracing::error!(error = %e, "Count failed");
                    eprintln!("Count failed: {e}");
                    return Ok(exit_code::FATAL);
                }
            };

        println!();
        println!("Source Counts:");
        println!("  Records: {}", estimate.records);
        println!("  ExplanationOfBenefit: {}", estimate.explanation_of_benefits);
        println!("  Items: {}", estimate.items);
        println!("  Contained Coverage: {}", estimate.coverages);
        println!("  Undecodable: {}", estimate.undecodable);
        println!();

        if *shutdown_signal.borrow() {
            println!("Count interrupted; totals are partial.");
            return Ok(exit_code::INTERRUPTED);
        }

        Ok(exit_code::SUCCESS)
    }
}
