//! Calibrated scoring model parameters
//!
//! The weights, bias, hard centroid-distance bounds and the recommended
//! probability cutoffs travel together as one versioned value, so a
//! recalibration ships as a config change (see `[calibration]` in the TOML
//! config) rather than as scattered literals.

use serde::{Deserialize, Serialize};

/// Offset from body centroid to head along the heading, in hive units
pub const HEAD_OFFSET: f64 = 3.19;

/// Upper probability cutoff used with the high-recall threshold.
///
/// Probabilities never exceed 1.0, so 2.0 means "no effective upper bound".
pub const NO_UPPER_CUTOFF: f64 = 2.0;

/// Versioned calibration of the interaction probability model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCalibration {
    /// Calibration identifier, logged at sweep start
    pub version: String,
    /// Weights for (centroid distance, head distance, heading alignment)
    pub weights: [f64; 3],
    /// Logistic bias term
    pub bias: f64,
    /// Centroid distances at or below this score exactly 0.0
    pub hard_min: f64,
    /// Centroid distances at or above this score exactly 0.0
    pub hard_max: f64,
    /// Lower probability cutoff for high-recall screening
    /// (85% recall / 18% precision on the calibration set)
    pub high_recall_threshold: f64,
    /// Upper probability cutoff paired with `high_recall_threshold`
    #[serde(default = "default_upper_cutoff")]
    pub upper_cutoff: f64,
}

fn default_upper_cutoff() -> f64 {
    NO_UPPER_CUTOFF
}

impl ModelCalibration {
    /// Production calibration "v1"
    pub fn production() -> Self {
        Self {
            version: "v1".to_string(),
            weights: [2.04332357, -1.56938987, 1.92212738],
            bias: -11.87978937,
            hard_min: 6.843017734527588,
            hard_max: 28.133578964233394,
            high_recall_threshold: 0.45398181,
            upper_cutoff: NO_UPPER_CUTOFF,
        }
    }

    /// Reject calibrations whose hard bounds or cutoffs cannot be satisfied
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.hard_min >= 0.0 && self.hard_min < self.hard_max) {
            return Err(crate::Error::Config(format!(
                "calibration {}: hard_min {} must be >= 0 and below hard_max {}",
                self.version, self.hard_min, self.hard_max
            )));
        }
        if self.high_recall_threshold > self.upper_cutoff {
            return Err(crate::Error::Config(format!(
                "calibration {}: threshold {} above upper cutoff {}",
                self.version, self.high_recall_threshold, self.upper_cutoff
            )));
        }
        let all_finite = self.weights.iter().all(|w| w.is_finite()) && self.bias.is_finite();
        if !all_finite {
            return Err(crate::Error::Config(format!(
                "calibration {}: weights and bias must be finite",
                self.version
            )));
        }
        Ok(())
    }
}

impl Default for ModelCalibration {
    fn default() -> Self {
        Self::production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_calibration_is_valid() {
        let calibration = ModelCalibration::production();
        assert!(calibration.validate().is_ok());
        assert_eq!(calibration.version, "v1");
        assert_eq!(calibration.upper_cutoff, 2.0);
    }

    #[test]
    fn test_inverted_hard_bounds_rejected() {
        let mut calibration = ModelCalibration::production();
        calibration.hard_min = 30.0;
        assert!(matches!(
            calibration.validate(),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_calibration_from_toml_defaults_upper_cutoff() {
        let calibration: ModelCalibration = toml::from_str(
            r#"
            version = "v2-test"
            weights = [1.0, -1.0, 1.0]
            bias = -5.0
            hard_min = 5.0
            hard_max = 25.0
            high_recall_threshold = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(calibration.upper_cutoff, NO_UPPER_CUTOFF);
        assert!(calibration.validate().is_ok());
    }
}
