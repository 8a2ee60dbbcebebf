//! Fitted per-column affine rescaling

use serde::{Deserialize, Serialize};

/// Affine transform learned at training time and applied unchanged at inference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureScaler {
    /// Standardization: `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Range scaling: `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl FeatureScaler {
    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            FeatureScaler::Standard { scale, .. } | FeatureScaler::MinMax { scale, .. } => scale.len(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let (offsets, scale) = match self {
            FeatureScaler::Standard { mean, scale } => (mean, scale),
            FeatureScaler::MinMax { min, scale } => (min, scale),
        };

        if offsets.len() != scale.len() {
            return Err(format!(
                "offset has {} entries, scale has {}",
                offsets.len(),
                scale.len()
            ));
        }
        if offsets.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite parameters".to_string());
        }
        if let FeatureScaler::Standard { scale, .. } = self {
            if let Some(col) = scale.iter().position(|s| *s == 0.0) {
                return Err(format!("zero standard deviation in column {col}"));
            }
        }
        Ok(())
    }

    /// Rescale one row in place. Width must equal [`FeatureScaler::n_features`].
    pub fn transform_row(&self, row: &mut [f64]) {
        match self {
            FeatureScaler::Standard { mean, scale } => {
                for ((value, mean), scale) in row.iter_mut().zip(mean).zip(scale) {
                    *value = (*value - mean) / scale;
                }
            }
            FeatureScaler::MinMax { min, scale } => {
                for ((value, min), scale) in row.iter_mut().zip(min).zip(scale) {
                    *value = *value * scale + min;
                }
            }
        }
    }
}
