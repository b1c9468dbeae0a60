//! Configuration loading and path resolution
//!
//! Paths resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing config file is not an error: the prefilter logs a warning and
//! runs on defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::archive::loader::DEFAULT_LOAD_WORKERS;
use crate::calibration::ModelCalibration;
use crate::{Error, Result};

/// Environment variable overriding the archive output directory
pub const OUTPUT_DIR_ENV: &str = "TROPH_OUTPUT_DIR";
/// Environment variable overriding the tracking database path
pub const TRACKING_DB_ENV: &str = "TROPH_TRACKING_DB";

pub const DEFAULT_WORKERS: usize = 32;
pub const DEFAULT_SUBSAMPLE_STRIDE: usize = 3;
pub const DEFAULT_CAMERAS: [u16; 4] = [0, 1, 2, 3];

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Contents of `prefilter.toml`; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub output_dir: Option<PathBuf>,
    pub tracking_db: Option<PathBuf>,
    pub workers: Option<usize>,
    pub load_workers: Option<usize>,
    pub subsample_stride: Option<usize>,
    pub cameras: Option<Vec<u16>>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Replaces the production calibration when present
    pub calibration: Option<ModelCalibration>,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load config from `path`, or from the platform default location.
    ///
    /// An explicitly given path must exist; a missing default file yields
    /// defaults with a warning.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_file() {
                Some(path) => path,
                None => {
                    warn!("No prefilter.toml found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        info!("Loaded config: {}", path.display());
        Self::from_toml_str(&content)
    }
}

/// First existing config file among the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("troph").join("prefilter.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/troph/prefilter.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("troph"))
        .unwrap_or_else(|| PathBuf::from("./troph_data"))
}

/// Resolve a path setting: CLI > environment > TOML > default
pub fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: PathBuf,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    default
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub tracking_db: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// Fully resolved prefilter settings
#[derive(Debug, Clone, PartialEq)]
pub struct PrefilterConfig {
    pub output_dir: PathBuf,
    pub tracking_db: PathBuf,
    pub workers: usize,
    pub load_workers: usize,
    pub subsample_stride: usize,
    pub cameras: Vec<u16>,
    pub log_level: String,
    pub calibration: ModelCalibration,
}

impl PrefilterConfig {
    /// Merge TOML values with command-line overrides and validate
    pub fn resolve(toml: TomlConfig, cli: CliOverrides) -> Result<Self> {
        let data_dir = default_data_dir();
        let output_dir = resolve_path(
            cli.output_dir.as_deref(),
            OUTPUT_DIR_ENV,
            toml.output_dir.as_deref(),
            data_dir.join("trophallaxis"),
        );
        let tracking_db = resolve_path(
            cli.tracking_db.as_deref(),
            TRACKING_DB_ENV,
            toml.tracking_db.as_deref(),
            data_dir.join("tracking.db"),
        );

        let config = Self {
            output_dir,
            tracking_db,
            workers: cli.workers.or(toml.workers).unwrap_or(DEFAULT_WORKERS),
            load_workers: toml.load_workers.unwrap_or(DEFAULT_LOAD_WORKERS),
            subsample_stride: toml.subsample_stride.unwrap_or(DEFAULT_SUBSAMPLE_STRIDE),
            cameras: toml.cameras.unwrap_or_else(|| DEFAULT_CAMERAS.to_vec()),
            log_level: toml.logging.level,
            calibration: toml.calibration.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 || self.load_workers == 0 {
            return Err(Error::Config("worker counts must be at least 1".to_string()));
        }
        if self.subsample_stride == 0 {
            return Err(Error::Config("subsample_stride must be at least 1".to_string()));
        }
        if self.cameras.is_empty() {
            return Err(Error::Config("cameras must not be empty".to_string()));
        }
        self.calibration.validate()
    }
}
