//! Run command implementation
//!
//! This module implements the `run` command: flatten every staged EOB
//! resource and append the curated records to the target tables.

use super::exit_code;
use crate::adapters::create_collaborators;
use crate::config::{load_config, EobCuratorConfig};
use crate::core::export::{PipelineCoordinator, PipelineSettings, PipelineSummary};
use crate::core::transform::Target;
use crate::domain::EtlError;
use crate::log_error_with_context;
use clap::{Args, ValueEnum};
use std::time::Duration;
use tokio::sync::watch;

/// Targets selectable from the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetArg {
    /// Line items only
    Items,
    /// Contained Coverage resources only
    Coverage,
    /// Every target
    All,
}

impl TargetArg {
    fn targets(self) -> Vec<Target> {
        match self {
            Self::Items => vec![Target::Items],
            Self::Coverage => vec![Target::Coverage],
            Self::All => Target::ALL.to_vec(),
        }
    }
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Override the configured targets
    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    /// Dry run mode - flatten everything without writing to the sink
    #[arg(long)]
    pub dry_run: bool,

    /// Override the number of raw records per batch
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut EobCuratorConfig) {
        if let Some(target) = self.target {
            tracing::info!(target_arg = ?target, "Overriding targets from CLI");
            config.pipeline.targets = target
                .targets()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect();
        }

        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.source.batch_size = batch_size;
        }

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
    }

    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(config) => config,
            Err(e) => {
                log_error_with_context!(&e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        self.apply_overrides(&mut config);

        // Overrides must pass the same checks as file settings
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(exit_code::CONFIGURATION);
        }

        let settings = match PipelineSettings::from_config(&config) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Configuration validation failed: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        if settings.dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("DRY RUN MODE - No data will be written to the sink");
            println!();
        }

        let collaborators = match create_collaborators(&config) {
            Ok(collaborators) => collaborators,
            Err(e @ EtlError::Configuration(_)) => {
                eprintln!("Failed to initialize collaborators: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
            Err(e) => {
                log_error_with_context!(&e, "Failed to initialize collaborators");
                eprintln!("Failed to initialize collaborators: {e}");
                return Ok(exit_code::CONNECTION);
            }
        };

        if let Err(e) = collaborators.source.test_connection().await {
            tracing::error!(error = %e, "Source connection test failed");
            eprintln!("Cannot reach source {}: {e}", collaborators.source.describe());
            return Ok(exit_code::CONNECTION);
        }
        if !settings.dry_run {
            if let Err(e) = collaborators.sink.test_connection().await {
                tracing::error!(error = %e, "Sink connection test failed");
                eprintln!("Cannot reach sink {}: {e}", collaborators.sink.describe());
                return Ok(exit_code::CONNECTION);
            }
        }

        let coordinator = PipelineCoordinator::new(
            settings,
            collaborators.source,
            collaborators.sink,
            shutdown_signal.clone(),
        );

        println!("Starting pipeline...");
        println!();

        let shutdown_timeout = Duration::from_secs(config.pipeline.shutdown_timeout_secs);
        let run = coordinator.execute();
        tokio::pin!(run);

        // After a shutdown signal the in-flight batch gets `shutdown_timeout` to finish
        let result = tokio::select! {
            result = &mut run => result,
            _ = shutdown_received(shutdown_signal) => {
                match tokio::time::timeout(shutdown_timeout, &mut run).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = shutdown_timeout.as_secs(),
                            "In-flight batch did not finish before the shutdown timeout"
                        );
                        eprintln!("Shutdown timeout reached, abandoning in-flight batch");
                        return Ok(exit_code::INTERRUPTED);
                    }
                }
            }
        };

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Pipeline failed");
                eprintln!("Pipeline failed: {e}");
                return Ok(exit_code::FATAL);
            }
        };

        print_summary(&summary);
        Ok(summary_exit_code(&summary))
    }
}

/// Resolves once a shutdown is requested; never if the sender is gone
async fn shutdown_received(mut shutdown_signal: watch::Receiver<bool>) {
    if shutdown_signal.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn print_summary(summary: &PipelineSummary) {
    println!();
    println!("Pipeline Summary:");
    println!("  Run ID: {}", summary.run_id);
    println!("  Batches: {}", summary.batches);
    println!("  Records Read: {}", summary.records_read);
    for target in &summary.targets {
        println!("  [{}] -> {}", target.target, target.table);
        println!("    Records Out: {}", target.result.records_out);
        println!("    Records Skipped: {}", target.result.records_skipped);
        println!("    Entries Dropped: {}", target.result.entries_dropped);
        println!("    Records Loaded: {}", target.records_loaded);
        if target.failed_loads > 0 {
            println!("    Failed Loads: {}", target.failed_loads);
        }
    }
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!("  Success Rate: {:.2}%", summary.success_rate());
    println!();

    if !summary.errors.is_empty() {
        println!("Errors encountered:");
        for error in &summary.errors {
            println!("  - {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("    Context: {context}");
            }
        }
        println!();
    }
}

/// Exit code for a finished run
pub fn summary_exit_code(summary: &PipelineSummary) -> i32 {
    if summary.interrupted {
        println!("Pipeline interrupted gracefully after batch {}.", summary.batches);
        tracing::info!("Pipeline interrupted by user signal");
        exit_code::INTERRUPTED
    } else if summary.is_successful() {
        println!("Pipeline completed successfully!");
        exit_code::SUCCESS
    } else {
        println!("Pipeline completed with dropped entries or failures");
        exit_code::PARTIAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::TargetSummary;

    fn config() -> EobCuratorConfig {
        toml::from_str(
            r#"
[source]
kind = "file"
path = "staging.ndjson"

[sink]
kind = "file"
output_dir = "curated"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_run_args_overrides() {
        let args = RunArgs {
            target: Some(TargetArg::Items),
            dry_run: true,
            batch_size: Some(42),
        };
        let mut config = config();
        args.apply_overrides(&mut config);

        assert_eq!(config.pipeline.targets, vec!["items".to_string()]);
        assert_eq!(config.source.batch_size, 42);
        assert!(config.application.dry_run);
    }

    #[test]
    fn test_run_args_without_overrides_keep_config() {
        let args = RunArgs {
            target: None,
            dry_run: false,
            batch_size: None,
        };
        let mut config = config();
        args.apply_overrides(&mut config);

        assert_eq!(config.pipeline.targets.len(), 2);
        assert!(!config.application.dry_run);
    }

    #[test]
    fn test_target_arg_all() {
        assert_eq!(TargetArg::All.targets(), Target::ALL.to_vec());
    }

    #[test]
    fn test_summary_exit_codes() {
        let mut summary = PipelineSummary::new(false);
        assert_eq!(summary_exit_code(&summary), exit_code::SUCCESS);

        let mut target = TargetSummary::new(Target::Items, "curated.items");
        target.failed_loads = 1;
        summary.targets.push(target);
        assert_eq!(summary_exit_code(&summary), exit_code::PARTIAL);

        summary.interrupted = true;
        assert_eq!(summary_exit_code(&summary), exit_code::INTERRUPTED);
    }
}
