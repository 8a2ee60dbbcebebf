//! JSON response bodies for prediction endpoints

use retrofit_core::{CellValue, InputRow, PredictionResult};
use serde::{Deserialize, Serialize};

/// kBtu per kWh
pub const KWH_TO_KBTU: f64 = 3.412;

/// Reported confidence; the model produces no uncertainty estimate
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.85;

/// First id handed out by `matched_comstock_id`
pub const COMSTOCK_ID_BASE: usize = 10_000;

pub const BUILDING_TYPE_COLUMN: &str = "in.comstock_building_type";
pub const FLOOR_AREA_COLUMN: &str = "in.sqft";
pub const CLIMATE_ZONE_COLUMN: &str = "in.ashrae_iecc_climate_zone_2006";

/// Training targets, listed after the inputs in the upload template
pub const TEMPLATE_TARGET_COLUMNS: [&str; 2] = [
    "out.site_energy.total.energy_consumption_intensity",
    "calc.emissions.total_with_cambium_mid_case_15y..co2e_kg",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictedValues {
    pub energy_use_intensity_kbtu_sqft: f64,
    pub ghg_emissions_kg_co2e: f64,
}

impl From<PredictionResult> for PredictedValues {
    fn from(result: PredictionResult) -> Self {
        Self {
            energy_use_intensity_kbtu_sqft: result.energy_value * KWH_TO_KBTU,
            ghg_emissions_kg_co2e: result.emissions_value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceScores {
    pub overall: f64,
}

/// One building's prediction, as returned by every prediction endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionOutput {
    pub predicted_values: PredictedValues,
    pub confidence_scores: ConfidenceScores,
    pub matched_comstock_id: String,
    pub model_used: String,
    pub processing_time_ms: f64,
    pub building_type: String,
    pub floor_area: f64,
    pub climate_zone: String,
}

impl PredictionOutput {
    /// `index` is the building's position in the request
    pub fn new(
        index: usize,
        row: &InputRow,
        result: PredictionResult,
        model_used: &str,
        processing_time_ms: f64,
    ) -> Self {
        let building_type = text_or(row.get(BUILDING_TYPE_COLUMN), "Commercial Building");
        let climate_zone = text_or(row.get(CLIMATE_ZONE_COLUMN), "Unknown");
        let floor_area = row
            .get(FLOOR_AREA_COLUMN)
            .and_then(CellValue::as_f64)
            .filter(|area| area.is_finite())
            .unwrap_or(0.0);

        Self {
            predicted_values: result.into(),
            confidence_scores: ConfidenceScores {
                overall: PLACEHOLDER_CONFIDENCE,
            },
            matched_comstock_id: format!("COMSTOCK_{}", COMSTOCK_ID_BASE + index),
            model_used: model_used.to_string(),
            processing_time_ms,
            building_type,
            floor_area,
            climate_zone,
        }
    }
}

fn text_or(cell: Option<&CellValue>, default: &str) -> String {
    match cell {
        Some(cell) if !cell.is_missing() => cell.to_string(),
        _ => default.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchPredictionOutput {
    pub predictions: Vec<PredictionOutput>,
    pub total_buildings: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
    pub total_processing_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_converts_units_and_reads_row_context() {
        let mut row = InputRow::new();
        row.insert(BUILDING_TYPE_COLUMN.into(), CellValue::from("LargeOffice"));
        row.insert(FLOOR_AREA_COLUMN.into(), CellValue::from("25000"));
        row.insert(CLIMATE_ZONE_COLUMN.into(), CellValue::from("5A"));

        let result = PredictionResult {
            energy_value: 10.0,
            emissions_value: 5000.0,
        };
        let output = PredictionOutput::new(7, &row, result, "XGBoost Multi-Target (m)", 1.5);

        assert!((output.predicted_values.energy_use_intensity_kbtu_sqft - 34.12).abs() < 1e-9);
        assert_eq!(output.predicted_values.ghg_emissions_kg_co2e, 5000.0);
        assert_eq!(output.confidence_scores.overall, 0.85);
        assert_eq!(output.matched_comstock_id, "COMSTOCK_10007");
        assert_eq!(output.building_type, "LargeOffice");
        assert_eq!(output.floor_area, 25000.0);
        assert_eq!(output.climate_zone, "5A");
    }

    #[test]
    fn missing_context_uses_defaults() {
        let mut row = InputRow::new();
        row.insert(FLOOR_AREA_COLUMN.into(), CellValue::Null);

        let result = PredictionResult {
            energy_value: 1.0,
            emissions_value: 1.0,
        };
        let output = PredictionOutput::new(0, &row, result, "m", 0.0);
        assert_eq!(output.building_type, "Commercial Building");
        assert_eq!(output.climate_zone, "Unknown");
        assert_eq!(output.floor_area, 0.0);
        assert_eq!(output.matched_comstock_id, "COMSTOCK_10000");
    }
}
