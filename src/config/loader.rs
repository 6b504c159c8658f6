//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CollaboratorKind, EobCuratorConfig};
use super::secret::secret_string;
use crate::domain::errors::EtlError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "EOB_CURATOR_";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into EobCuratorConfig
/// 4. Applies environment variable overrides (EOB_CURATOR_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use eob_curator::config::loader::load_config;
///
/// let config = load_config("eob-curator.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<EobCuratorConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(EtlError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        EtlError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: EobCuratorConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        EtlError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced environment variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_pattern();
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(EtlError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}")).ok()
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        EtlError::Configuration(format!(
            "Invalid value '{value}' for environment override {ENV_PREFIX}{key}"
        ))
    })
}

fn parse_kind(key: &str, value: &str) -> Result<CollaboratorKind> {
    match value.trim().to_lowercase().as_str() {
        "postgresql" => Ok(CollaboratorKind::PostgreSQL),
        "file" => Ok(CollaboratorKind::File),
        _ => Err(EtlError::Configuration(format!(
            "Invalid value '{value}' for environment override {ENV_PREFIX}{key}. Expected 'postgresql' or 'file'"
        ))),
    }
}

/// Applies environment variable overrides using the EOB_CURATOR_* prefix
///
/// Environment variables follow the pattern: EOB_CURATOR_<SECTION>_<KEY>
/// For example: EOB_CURATOR_SOURCE_BATCH_SIZE, EOB_CURATOR_SINK_ITEMS_TABLE
///
/// A malformed numeric or boolean override is a configuration error.
fn apply_env_overrides(config: &mut EobCuratorConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env_override("APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_override("APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("APPLICATION_DRY_RUN", &val)?;
    }

    // Source overrides
    if let Some(val) = env_override("SOURCE_KIND") {
        config.source.kind = parse_kind("SOURCE_KIND", &val)?;
    }
    if let Some(val) = env_override("SOURCE_BATCH_SIZE") {
        config.source.batch_size = parse_override("SOURCE_BATCH_SIZE", &val)?;
    }
    if let Some(val) = env_override("SOURCE_STAGING_TABLE") {
        config.source.staging_table = val;
    }
    if let Some(val) = env_override("SOURCE_PATH") {
        config.source.path = Some(val);
    }

    // Sink overrides
    if let Some(val) = env_override("SINK_KIND") {
        config.sink.kind = parse_kind("SINK_KIND", &val)?;
    }
    if let Some(val) = env_override("SINK_ITEMS_TABLE") {
        config.sink.items_table = val;
    }
    if let Some(val) = env_override("SINK_COVERAGE_TABLE") {
        config.sink.coverage_table = val;
    }
    if let Some(val) = env_override("SINK_OUTPUT_DIR") {
        config.sink.output_dir = Some(val);
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg_config) = config.postgresql {
        if let Some(val) = env_override("POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = secret_string(val);
        }
        if let Some(val) = env_override("POSTGRESQL_MAX_CONNECTIONS") {
            pg_config.max_connections = parse_override("POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
        if let Some(val) = env_override("POSTGRESQL_SSL_MODE") {
            pg_config.ssl_mode = val;
        }
    }

    // Pipeline overrides
    if let Some(val) = env_override("PIPELINE_TARGETS") {
        config.pipeline.targets = val
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Logging overrides
    if let Some(val) = env_override("LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = env_override("LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_override("LOGGING_JSON_CONSOLE") {
        config.logging.json_console = parse_override("LOGGING_JSON_CONSOLE", &val)?;
    }

    Ok(())
}
