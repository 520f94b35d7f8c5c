//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{CaduceusConfig, PostgreSQLConfig, RedisConfig};
use super::secret_string;
use crate::domain::errors::CaduceusError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CaduceusConfig
/// 4. Applies environment variable overrides (CADUCEUS_* prefix)
/// 5. Validates the configuration
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - A referenced environment variable is not set
/// - An override value cannot be parsed
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use caduceus::config::loader::load_config;
///
/// let config = load_config("caduceus.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CaduceusConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CaduceusError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CaduceusError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] without the file access.
///
/// # Errors
///
/// Returns an error on substitution, parse, override or validation failure
pub fn load_config_str(contents: &str) -> Result<CaduceusConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CaduceusConfig = toml::from_str(&contents)
        .map_err(|e| CaduceusError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        CaduceusError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder regex is valid"))
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied through untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_regex();
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
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
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
        return Err(CaduceusError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CaduceusError::Configuration(format!("Invalid value for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using CADUCEUS_* prefix
///
/// Environment variables follow the pattern: CADUCEUS_<SECTION>_<KEY>
/// For example: CADUCEUS_DATABASE_BACKEND, CADUCEUS_COUNTER_FALLBACK_ENABLED.
/// Setting a connection string or URL creates the corresponding block if the
/// file did not define it.
///
/// # Errors
///
/// Returns an error if an override is set but cannot be parsed
fn apply_env_overrides(config: &mut CaduceusConfig) -> Result<()> {
    if let Ok(val) = std::env::var("CADUCEUS_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("CADUCEUS_ENVIRONMENT")? {
        config.environment = val;
    }

    // Database overrides
    if let Some(val) = env_parse("CADUCEUS_DATABASE_BACKEND")? {
        config.database.backend = val;
    }
    if let Some(val) = env_parse("CADUCEUS_DATABASE_LOCK_TIMEOUT_MS")? {
        config.database.lock_timeout_ms = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_DATABASE_POSTGRESQL_CONNECTION_STRING") {
        match config.database.postgresql.as_mut() {
            Some(pg) => pg.connection_string = secret_string(val),
            None => {
                config.database.postgresql = Some(PostgreSQLConfig {
                    connection_string: secret_string(val),
                    max_connections: 20,
                    connection_timeout_seconds: 30,
                    statement_timeout_seconds: 60,
                })
            }
        }
    }
    if let Some(pg) = config.database.postgresql.as_mut() {
        if let Some(val) = env_parse("CADUCEUS_DATABASE_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
    }

    // Redis overrides
    if let Ok(val) = std::env::var("CADUCEUS_REDIS_URL") {
        match config.redis.as_mut() {
            Some(redis) => redis.url = secret_string(val),
            None => {
                config.redis = Some(RedisConfig {
                    url: secret_string(val),
                    pool_size: 16,
                    timeout_ms: 2000,
                })
            }
        }
    }

    // Counter overrides
    if let Some(val) = env_parse("CADUCEUS_COUNTER_BACKEND")? {
        config.counter.backend = val;
    }
    if let Some(val) = env_parse("CADUCEUS_COUNTER_FALLBACK_ENABLED")? {
        config.counter.fallback_enabled = val;
    }

    // Event overrides
    if let Some(val) = env_parse("CADUCEUS_EVENTS_EXTERNAL")? {
        config.events.external = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_EVENTS_CHANNEL") {
        config.events.channel = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_EVENTS_INSTANCE_ID") {
        config.events.instance_id = Some(val);
    }

    // Inventory overrides
    if let Some(val) = env_parse("CADUCEUS_INVENTORY_LOW_STOCK_THRESHOLD")? {
        config.inventory.low_stock_threshold = val;
    }

    // Workforce overrides
    if let Ok(val) = std::env::var("CADUCEUS_WORKFORCE_SHIFT_START") {
        config.workforce.shift_start = val;
    }
    if let Some(val) = env_parse("CADUCEUS_WORKFORCE_LATE_GRACE_MINUTES")? {
        config.workforce.late_grace_minutes = val;
    }
    if let Some(val) = env_parse("CADUCEUS_WORKFORCE_OVERTIME_MULTIPLIER")? {
        config.workforce.overtime_multiplier = val;
    }
    if let Some(val) = env_parse("CADUCEUS_WORKFORCE_UTC_OFFSET_MINUTES")? {
        config.workforce.utc_offset_minutes = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("CADUCEUS_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("CADUCEUS_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("CADUCEUS_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${CADUCEUS_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("CADUCEUS_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("CADUCEUS_LOADER_MISSING_VAR");
        let input = "password = \"${CADUCEUS_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("CADUCEUS_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# url = \"${CADUCEUS_LOADER_NEVER_SET}\"\nkey = 1";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[inventory]
low_stock_threshold = "5"

[workforce]
shift_start = "07:00"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.workforce.shift_start, "07:00");
        assert_eq!(
            config.inventory.low_stock_threshold,
            rust_decimal::Decimal::from(5)
        );
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let err = load_config_str("[application\nlog_level = 1").unwrap_err();
        assert!(matches!(err, CaduceusError::Configuration(_)));
    }
}
