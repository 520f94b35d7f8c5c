//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold ENV_MUTEX.

use caduceus::config::{load_config, CounterBackend, ExternalChannel, StoreBackend};
use caduceus::domain::CaduceusError;
use chrono::{NaiveTime, Timelike};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for var in [
        "CADUCEUS_APPLICATION_LOG_LEVEL",
        "CADUCEUS_COUNTER_FALLBACK_ENABLED",
        "CADUCEUS_INVENTORY_LOW_STOCK_THRESHOLD",
        "CADUCEUS_WORKFORCE_SHIFT_START",
        "CADUCEUS_EVENTS_INSTANCE_ID",
        "TEST_CADUCEUS_PG_PASSWORD",
    ] {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
environment = "staging"

[application]
log_level = "debug"

[database]
backend = "postgresql"
lock_timeout_ms = 2500

[database.postgresql]
connection_string = "postgresql://hms:secret@db:5432/hms"
max_connections = 12

[counter]
backend = "redis"
fallback_enabled = false

[redis]
url = "redis://cache:6379/0"
pool_size = 4

[events]
external = "redis"
channel = "hms:events"
instance_id = "ward-3"
listen_remote = false

[inventory]
low_stock_threshold = "2.5"

[workforce]
shift_start = "07:30"
late_grace_minutes = 10
standard_shift_hours = 12
overtime_multiplier = "2"
utc_offset_minutes = 180

[logging]
local_enabled = false
local_rotation = "hourly"
audit_events = false
"#,
    );

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.database.backend, StoreBackend::PostgreSQL);
    assert_eq!(config.database.lock_timeout_ms, 2500);
    assert_eq!(
        config.database.postgresql.as_ref().unwrap().max_connections,
        12
    );
    assert_eq!(config.counter.backend, CounterBackend::Redis);
    assert!(!config.counter.fallback_enabled);
    assert_eq!(config.redis.as_ref().unwrap().pool_size, 4);
    assert_eq!(config.events.external, ExternalChannel::Redis);
    assert_eq!(config.events.resolve_instance_id(), "ward-3");
    assert!(!config.events.listen_remote);
    assert_eq!(
        config.inventory.low_stock_threshold,
        Decimal::new(25, 1)
    );
    assert!(!config.logging.audit_events);

    let policy = config.workforce.shift_policy().unwrap();
    assert_eq!(policy.shift_start, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    assert_eq!(policy.standard_shift.num_hours(), 12);
    assert_eq!(policy.offset.local_minus_utc(), 180 * 60);
}

#[test]
fn test_empty_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config("");
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.database.backend, StoreBackend::Memory);
    assert_eq!(config.counter.backend, CounterBackend::Memory);
    assert_eq!(config.events.external, ExternalChannel::None);
    assert!(config.counter.fallback_enabled);
    assert!(config.redis.is_none());

    let policy = config.workforce.shift_policy().unwrap();
    assert_eq!(policy.shift_start.hour(), 8);
}

#[test]
fn test_env_overrides_win_over_file() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "info"

[inventory]
low_stock_threshold = "10"
"#,
    );

    std::env::set_var("CADUCEUS_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("CADUCEUS_COUNTER_FALLBACK_ENABLED", "false");
    std::env::set_var("CADUCEUS_INVENTORY_LOW_STOCK_THRESHOLD", "4");
    std::env::set_var("CADUCEUS_WORKFORCE_SHIFT_START", "06:00");
    let result = load_config(file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert!(!config.counter.fallback_enabled);
    assert_eq!(config.inventory.low_stock_threshold, Decimal::from(4));
    assert_eq!(config.workforce.shift_start, "06:00");
}

#[test]
fn test_unparseable_override_is_configuration_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config("");
    std::env::set_var("CADUCEUS_COUNTER_FALLBACK_ENABLED", "sometimes");
    let result = load_config(file.path());
    cleanup_env_vars();

    assert!(matches!(result, Err(CaduceusError::Configuration(_))));
}

#[test]
fn test_placeholder_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[database]
backend = "postgresql"

[database.postgresql]
connection_string = "postgresql://hms:${TEST_CADUCEUS_PG_PASSWORD}@db:5432/hms"
"#,
    );

    std::env::set_var("TEST_CADUCEUS_PG_PASSWORD", "s3cret");
    let result = load_config(file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    let pg = config.database.postgresql.unwrap();
    assert_eq!(
        pg.connection_string.expose_secret().as_ref(),
        "postgresql://hms:s3cret@db:5432/hms"
    );
    assert!(!format!("{pg:?}").contains("s3cret"));
}

#[test]
fn test_missing_placeholder_variable_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[redis]
url = "${TEST_CADUCEUS_PG_PASSWORD}"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_CADUCEUS_PG_PASSWORD"));
}

#[test]
fn test_invalid_sections_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    for contents in [
        "[counter]\nbackend = \"redis\"\n",
        "[database]\nbackend = \"postgresql\"\n",
        "[inventory]\nlow_stock_threshold = \"-1\"\n",
        "[workforce]\nstandard_shift_hours = 0\n",
        "[workforce]\novertime_multiplier = \"0.5\"\n",
        "[logging]\nlocal_rotation = \"weekly\"\n",
        "environment = \"production\"\n",
    ] {
        let file = write_config(contents);
        assert!(
            matches!(load_config(file.path()), Err(CaduceusError::Configuration(_))),
            "accepted invalid config: {contents}"
        );
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/caduceus.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
