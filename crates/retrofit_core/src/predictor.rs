//! Inference facade over a loaded artifact bundle

use crate::artifacts::{ArtifactBundle, ResolverOptions};
use crate::errors::{Result, RetrofitError};
use crate::features::{align, AlignedMatrix, CellValue, InputRow};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Output column for predicted energy use intensity (kWh per ft²)
pub const ENERGY_OUTPUT_COLUMN: &str = "predicted_energy_intensity_kwh_per_sqft";
/// Output column for predicted emissions (kg CO2e)
pub const EMISSIONS_OUTPUT_COLUMN: &str = "predicted_co2_emissions_co2e_kg";

/// Number of outputs the model must produce per row
pub const TARGET_COUNT: usize = 2;

/// Predicted targets for one building
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub energy_value: f64,
    pub emissions_value: f64,
}

impl PredictionResult {
    pub fn is_finite(&self) -> bool {
        self.energy_value.is_finite() && self.emissions_value.is_finite()
    }
}

/// An input row copy with both predictions appended, plus the raw result
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedRow {
    pub row: InputRow,
    pub result: PredictionResult,
}

/// Owns an [`ArtifactBundle`] and runs the align → predict → attach pipeline.
///
/// Holds no mutable state; share it behind an `Arc` across concurrent callers.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self { bundle }
    }

    /// Resolve and load the latest artifacts in `directory`
    pub fn from_directory<P: AsRef<Path>>(directory: P, options: &ResolverOptions) -> Result<Self> {
        ArtifactBundle::load_latest_with(directory, options).map(Self::new)
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// Feature matrix for `rows`, exactly as the model will see it
    pub fn prepare(&self, rows: &[InputRow]) -> Result<AlignedMatrix> {
        align(
            rows,
            &self.bundle.schema,
            &self.bundle.encoders,
            &self.bundle.scaler,
        )
    }

    /// Predict both targets for every row with one batch model call.
    ///
    /// Input rows are left untouched; results carry copies.
    pub fn predict(&self, rows: &[InputRow]) -> Result<Vec<PredictedRow>> {
        let matrix = self.prepare(rows)?;

        let outputs = self
            .bundle
            .model
            .predict(&matrix)
            .map_err(|e| RetrofitError::PredictionFailure(e.to_string()))?;

        if outputs.len() != rows.len() {
            return Err(RetrofitError::PredictionFailure(format!(
                "model returned {} rows for {} inputs",
                outputs.len(),
                rows.len()
            )));
        }

        let predicted = rows
            .iter()
            .zip(outputs)
            .map(|(row, output)| {
                if output.len() != TARGET_COUNT {
                    return Err(RetrofitError::PredictionFailure(format!(
                        "model returned {} outputs per row, expected {TARGET_COUNT}",
                        output.len()
                    )));
                }
                let result = PredictionResult {
                    energy_value: output[0],
                    emissions_value: output[1],
                };
                let mut row = row.clone();
                row.insert(ENERGY_OUTPUT_COLUMN.to_string(), CellValue::Number(result.energy_value));
                row.insert(EMISSIONS_OUTPUT_COLUMN.to_string(), CellValue::Number(result.emissions_value));
                Ok(PredictedRow { row, result })
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(summary) = PredictionSummary::from_results(predicted.iter().map(|p| p.result)) {
            info!(
                rows = predicted.len(),
                energy_mean = summary.energy.mean,
                energy_min = summary.energy.min,
                energy_max = summary.energy.max,
                emissions_mean = summary.emissions.mean,
                "Predictions complete"
            );
        }

        Ok(predicted)
    }
}

/// Mean, population standard deviation and range of one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl TargetStats {
    fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std: variance.sqrt(),
            min,
            max,
        })
    }
}

/// Per-target statistics over a prediction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub energy: TargetStats,
    pub emissions: TargetStats,
}

impl PredictionSummary {
    pub fn from_results<I>(results: I) -> Option<Self>
    where
        I: IntoIterator<Item = PredictionResult>,
    {
        let (energy, emissions): (Vec<f64>, Vec<f64>) = results
            .into_iter()
            .map(|r| (r.energy_value, r.emissions_value))
            .unzip();
        Some(Self {
            energy: TargetStats::from_values(&energy)?,
            emissions: TargetStats::from_values(&emissions)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_statistics() {
        let results = [
            PredictionResult {
                energy_value: 1.0,
                emissions_value: 10.0,
            },
            PredictionResult {
                energy_value: 3.0,
                emissions_value: 30.0,
            },
        ];
        let summary = PredictionSummary::from_results(results).unwrap();
        assert_eq!(summary.energy.mean, 2.0);
        assert_eq!(summary.energy.std, 1.0);
        assert_eq!(summary.emissions.min, 10.0);
        assert_eq!(summary.emissions.max, 30.0);
    }

    #[test]
    fn empty_summary() {
        assert!(PredictionSummary::from_results(Vec::new()).is_none());
    }
}
