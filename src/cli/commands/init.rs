//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use super::exit_code;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "eob-curator.toml")]
    pub output: String,

    /// Generate a PostgreSQL configuration with every setting documented
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(exit_code::CONFIGURATION);
        }

        let config_content = if self.with_examples {
            generate_config_with_examples()
        } else {
            generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set EOB_CURATOR_DATABASE_URL in .env (if using PostgreSQL)");
                println!("  3. Validate configuration: eob-curator validate-config");
                println!("  4. Preview a run: eob-curator run --dry-run");
                println!();
                Ok(exit_code::SUCCESS)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(exit_code::FATAL)
            }
        }
    }
}

/// Configuration reading and writing NDJSON files
fn generate_minimal_config() -> &'static str {
    r#"# eob-curator configuration
# Flattens FHIR ExplanationOfBenefit resources into curated tables

[application]
log_level = "info"
dry_run = false

[source]
kind = "file"                 # postgresql | file
path = "staging/explanationofbenefits.ndjson"
batch_size = 5000

[sink]
kind = "file"                 # postgresql | file
output_dir = "curated"

[pipeline]
targets = ["items", "coverage"]
"#
}

/// PostgreSQL configuration with every setting and its default
fn generate_config_with_examples() -> &'static str {
    r#"# eob-curator configuration
# Flattens FHIR ExplanationOfBenefit resources into curated tables
#
# ${VAR} placeholders are replaced from the environment (and .env).
# Any setting can be overridden with EOB_CURATOR_<SECTION>_<KEY>,
# e.g. EOB_CURATOR_SOURCE_BATCH_SIZE=1000.

environment = "development"   # development | staging | production

[application]
log_level = "info"            # trace | debug | info | warn | error
dry_run = false               # flatten without writing to the sink

[source]
kind = "postgresql"           # postgresql | file
staging_table = "fhir_staging.explanationofbenefits"
id_column = "explanationofbenefit_id"
resource_column = "resource"  # JSON object or JSON text
batch_size = 5000             # 1 - 50000
# path = "staging/explanationofbenefits.ndjson"   # required for kind = "file"

[sink]
kind = "postgresql"           # postgresql | file
items_table = "fhir_curated.eob_items"
coverage_table = "fhir_curated.eob_coverage"
# output_dir = "curated"      # required for kind = "file"

[postgresql]
connection_string = "${EOB_CURATOR_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
ssl_mode = "prefer"           # disable | allow | prefer | require | verify-ca | verify-full

[pipeline]
targets = ["items", "coverage"]
shutdown_timeout_secs = 30    # grace period for the in-flight batch

[logging]
local_enabled = false
local_path = "./logs"
local_rotation = "daily"      # daily | hourly | never
json_console = false
"#
}
