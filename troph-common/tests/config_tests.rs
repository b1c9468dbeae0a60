//! Configuration resolution tests
//!
//! Tests that set TROPH_OUTPUT_DIR / TROPH_TRACKING_DB are marked #[serial]
//! so they do not race on the process environment.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use troph_common::config::{
    CliOverrides, PrefilterConfig, TomlConfig, DEFAULT_CAMERAS, DEFAULT_SUBSAMPLE_STRIDE,
    DEFAULT_WORKERS, OUTPUT_DIR_ENV, TRACKING_DB_ENV,
};
use troph_common::ModelCalibration;

fn clear_env() {
    env::remove_var(OUTPUT_DIR_ENV);
    env::remove_var(TRACKING_DB_ENV);
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    clear_env();

    let config = PrefilterConfig::resolve(TomlConfig::default(), CliOverrides::default()).unwrap();

    assert_eq!(config.workers, DEFAULT_WORKERS);
    assert_eq!(config.subsample_stride, DEFAULT_SUBSAMPLE_STRIDE);
    assert_eq!(config.cameras, DEFAULT_CAMERAS.to_vec());
    assert_eq!(config.calibration, ModelCalibration::production());
    assert!(config.output_dir.ends_with("trophallaxis"));
    assert!(config.tracking_db.ends_with("tracking.db"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(OUTPUT_DIR_ENV, "/tmp/troph-env-output");

    let toml = TomlConfig {
        output_dir: Some(PathBuf::from("/tmp/troph-toml-output")),
        tracking_db: Some(PathBuf::from("/tmp/troph-toml.db")),
        ..Default::default()
    };
    let config = PrefilterConfig::resolve(toml, CliOverrides::default()).unwrap();

    assert_eq!(config.output_dir, PathBuf::from("/tmp/troph-env-output"));
    assert_eq!(config.tracking_db, PathBuf::from("/tmp/troph-toml.db"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(TRACKING_DB_ENV, "/tmp/troph-env.db");

    let cli = CliOverrides {
        tracking_db: Some(PathBuf::from("/tmp/troph-cli.db")),
        workers: Some(8),
        ..Default::default()
    };
    let toml = TomlConfig {
        workers: Some(64),
        ..Default::default()
    };
    let config = PrefilterConfig::resolve(toml, cli).unwrap();

    assert_eq!(config.tracking_db, PathBuf::from("/tmp/troph-cli.db"));
    assert_eq!(config.workers, 8);

    clear_env();
}

#[test]
#[serial]
fn test_load_toml_file_with_calibration() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
output_dir = "/tmp/troph-file-output"
workers = 12
cameras = [0, 2]

[logging]
level = "debug"

[calibration]
version = "v2-test"
weights = [2.0, -1.5, 1.9]
bias = -11.0
hard_min = 6.0
hard_max = 30.0
high_recall_threshold = 0.4
"#
    )
    .unwrap();

    let toml = TomlConfig::load(Some(file.path())).unwrap();
    let config = PrefilterConfig::resolve(toml, CliOverrides::default()).unwrap();

    assert_eq!(config.output_dir, PathBuf::from("/tmp/troph-file-output"));
    assert_eq!(config.workers, 12);
    assert_eq!(config.cameras, vec![0, 2]);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.calibration.version, "v2-test");
    assert_eq!(config.calibration.upper_cutoff, 2.0);
}

#[test]
fn test_explicit_missing_config_file_is_error() {
    let result = TomlConfig::load(Some(std::path::Path::new("/nonexistent/prefilter.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_invalid_calibration_rejected() {
    clear_env();
    let mut calibration = ModelCalibration::production();
    calibration.hard_min = calibration.hard_max;
    let toml = TomlConfig {
        calibration: Some(calibration),
        ..Default::default()
    };
    assert!(PrefilterConfig::resolve(toml, CliOverrides::default()).is_err());
}
