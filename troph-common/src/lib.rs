//! # Trophallaxis Prefilter Common Library
//!
//! Shared code for the prefilter sweep and for analysis consumers:
//! - Pose scoring model and its calibrated configuration
//! - Candidate, frame and window types
//! - Tracking database contracts and the SQLite adapter
//! - Result archive naming, encoding and loading
//! - Configuration loading

pub mod archive;
pub mod calibration;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod tracking;
pub mod types;

pub use calibration::ModelCalibration;
pub use error::{Error, Result};
pub use model::{Pose, ProbabilityModel};
