#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Configuration tests
//!
//! # Test Coverage
//!
//! - `ServerOptions` loaded from YAML and JSON, partial files keep defaults
//! - A zero body limit means unlimited
//! - Invalid option files report the file path
//! - `RuntimeConfig` and `WorkerPoolConfig` from `RESTMAP_*` variables
//! - `LogConfig` from `RESTMAP_LOG_*` variables

use restmapper::logging::{LogConfig, LogFormat};
use restmapper::runtime_config::{parse_size, RuntimeConfig, ServerOptions};
use restmapper::worker_pool::WorkerPoolConfig;
use std::env;
use std::io::Write;
use std::sync::Mutex;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const RUNTIME_VARS: [&str; 3] = [
    "RESTMAP_STACK_SIZE",
    "RESTMAP_BLOCKING_WORKERS",
    "RESTMAP_ORDERED_LANES",
];

const LOG_VARS: [&str; 4] = [
    "RESTMAP_LOG_LEVEL",
    "RESTMAP_LOG_FORMAT",
    "RESTMAP_LOG_TARGET_FILTER",
    "RESTMAP_LOG_INCLUDE_LOCATION",
];

#[test]
fn test_server_options_from_yaml() {
    let file = write_temp(
        ".yaml",
        "uploadPath: /var/tmp/uploads\nbodyLimit: 1048576\ndeleteUploadedFilesOnEnd: true\n",
    );
    let options = ServerOptions::load(file.path()).unwrap();
    assert_eq!(options.upload_path, "/var/tmp/uploads");
    assert_eq!(options.body_limit, 1_048_576);
    assert!(options.delete_uploaded_files_on_end);
    assert!(!options.merge_form_attributes);
}

#[test]
fn test_server_options_from_json() {
    let file = write_temp(".json", r#"{"mergeFormAttributes": true, "bodyLimit": 10}"#);
    let options = ServerOptions::load(file.path()).unwrap();
    assert!(options.merge_form_attributes);
    assert!(options.delete_uploaded_files_on_end);
    assert!(options.exceeds_body_limit(11));
    assert!(!options.exceeds_body_limit(10));
    assert_eq!(options.upload_path, ServerOptions::default().upload_path);
}

#[test]
fn test_server_options_defaults() {
    let options = ServerOptions::default();
    assert_eq!(options.body_limit, 0);
    assert!(!options.exceeds_body_limit(usize::MAX));
    assert!(options.delete_uploaded_files_on_end);
    assert!(!options.merge_form_attributes);

    let file = write_temp(".yaml", "bodyLimit: 0\n");
    assert_eq!(ServerOptions::load(file.path()).unwrap(), options);
}

#[test]
fn test_server_options_errors_name_the_file() {
    let file = write_temp(".json", "{ not json");
    let err = ServerOptions::load(file.path()).unwrap_err();
    assert!(err.to_string().contains(&file.path().display().to_string()));
    assert!(ServerOptions::load("/definitely/not/here.yaml").is_err());
}

#[test]
fn test_runtime_config_from_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("RESTMAP_STACK_SIZE", "0x8000");
    env::set_var("RESTMAP_BLOCKING_WORKERS", "8");
    env::set_var("RESTMAP_ORDERED_LANES", "not-a-number");

    let config = RuntimeConfig::from_env();
    assert_eq!(config.stack_size, 0x8000);
    assert_eq!(config.blocking_workers, 8);
    assert_eq!(config.ordered_lanes, RuntimeConfig::default().ordered_lanes);

    let pool = WorkerPoolConfig::from_env();
    assert_eq!(pool.num_workers, 8);
    assert_eq!(pool.stack_size, 0x8000);

    for var in RUNTIME_VARS {
        env::remove_var(var);
    }
    assert_eq!(RuntimeConfig::from_env(), RuntimeConfig::default());
}

#[test]
fn test_parse_size_formats() {
    assert_eq!(parse_size("65536"), Some(65536));
    assert_eq!(parse_size(" 0x10000 "), Some(0x10000));
    assert_eq!(parse_size("64k"), None);
}

#[test]
fn test_log_config_from_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    env::set_var("RESTMAP_LOG_LEVEL", "debug");
    env::set_var("RESTMAP_LOG_FORMAT", "pretty");
    env::set_var("RESTMAP_LOG_TARGET_FILTER", "restmapper::dispatcher=trace");
    env::set_var("RESTMAP_LOG_INCLUDE_LOCATION", "true");

    let config = LogConfig::from_env();
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.format, LogFormat::Pretty);
    assert_eq!(
        config.target_filter.as_deref(),
        Some("restmapper::dispatcher=trace")
    );
    assert!(config.include_location);

    for var in LOG_VARS {
        env::remove_var(var);
    }
    let config = LogConfig::from_env();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.format, LogFormat::Json);
    assert!(!config.include_location);
}
