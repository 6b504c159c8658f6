//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the eob-curator configuration file.

use super::exit_code;
use crate::config::{load_config, CollaboratorKind, EobCuratorConfig};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so a load failure covers both parse and
    /// validation errors.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        println!("Configuration is valid");
        println!();
        for line in summary_lines(&config) {
            println!("{line}");
        }
        println!();
        Ok(exit_code::SUCCESS)
    }
}

fn describe_kind(kind: CollaboratorKind) -> &'static str {
    match kind {
        CollaboratorKind::PostgreSQL => "PostgreSQL",
        CollaboratorKind::File => "NDJSON file",
    }
}

/// Human-readable configuration summary, without secrets
fn summary_lines(config: &EobCuratorConfig) -> Vec<String> {
    let mut lines = vec![
        "Configuration Summary:".to_string(),
        format!("  Environment: {:?}", config.environment),
        format!("  Log Level: {}", config.application.log_level),
        format!("  Dry Run: {}", config.application.dry_run),
        format!("  Source: {}", describe_kind(config.source.kind)),
    ];

    match config.source.kind {
        CollaboratorKind::PostgreSQL => {
            lines.push(format!("    Staging Table: {}", config.source.staging_table));
            lines.push(format!(
                "    Columns: {}, {}",
                config.source.id_column, config.source.resource_column
            ));
        }
        CollaboratorKind::File => {
            lines.push(format!(
                "    Path: {}",
                config.source.path.as_deref().unwrap_or_default()
            ));
        }
    }
    lines.push(format!("    Batch Size: {}", config.source.batch_size));

    lines.push(format!("  Sink: {}", describe_kind(config.sink.kind)));
    if let Some(output_dir) = &config.sink.output_dir {
        lines.push(format!("    Output Dir: {output_dir}"));
    }
    lines.push(format!("    Items Table: {}", config.sink.items_table));
    lines.push(format!("    Coverage Table: {}", config.sink.coverage_table));

    if let Some(pg_config) = config.postgresql.as_ref().filter(|_| config.uses_postgresql()) {
        use secrecy::ExposeSecret;
        lines.push(format!(
            "  PostgreSQL Host: {}",
            pg_config
                .connection_string
                .expose_secret()
                .as_str()
                .rsplit('@')
                .next()
                .unwrap_or("***")
        ));
        lines.push(format!("  Max Connections: {}", pg_config.max_connections));
        lines.push(format!("  SSL Mode: {}", pg_config.ssl_mode));
    }

    lines.push(format!("  Targets: {:?}", config.pipeline.targets));
    lines
}
