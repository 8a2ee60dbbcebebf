//! Input rows and feature alignment
//!
//! Turns loosely-typed building records into the dense matrix the model was
//! trained on: project to the schema's columns, encode categoricals, impute
//! numerics, then rescale. The order of those steps matches training.

use crate::encoder::{EncoderSet, LabelEncoder};
use crate::errors::{Result, RetrofitError};
use crate::scaler::FeatureScaler;
use crate::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A single scalar cell of tabular input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Null or NaN
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// String form used to look up categorical classes
    pub fn category_key(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Numeric interpretation; missing values come back as NaN
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Null => Some(f64::NAN),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Number(n) if n.is_nan() => Ok(()),
            other => f.write_str(&other.category_key()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// Integral values print without a fractional part so `3.0` matches class `"3"`
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// One building record: column name → value
pub type InputRow = BTreeMap<String, CellValue>;

/// Dense row-major feature matrix with a fixed column order
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
}

impl AlignedMatrix {
    pub fn new(columns: Vec<String>, data: Vec<f64>) -> Result<Self> {
        if columns.is_empty() {
            return Err(RetrofitError::ShapeMismatch(
                "matrix must have at least one column".to_string(),
            ));
        }
        if data.len() % columns.len() != 0 {
            return Err(RetrofitError::ShapeMismatch(format!(
                "{} values do not fill rows of width {}",
                data.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, data })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.data.len() / self.columns.len()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let width = self.n_cols();
        self.data.get(index * width..(index + 1) * width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.columns.len())
    }
}

/// How a schema column becomes a number
enum ColumnPlan<'a> {
    Encoded(&'a LabelEncoder),
    Numerical,
    Passthrough,
}

/// Build the model input matrix for `rows`.
///
/// Every schema column must appear in at least one row; absent columns are
/// reported together. Categorical columns with an encoder map unseen and
/// missing values to the first class. Numerical columns impute missing
/// values with 0. Other columns are parsed as numbers with missing kept as
/// NaN. The scaler is applied last.
pub fn align(
    rows: &[InputRow],
    schema: &FeatureSchema,
    encoders: &EncoderSet,
    scaler: &FeatureScaler,
) -> Result<AlignedMatrix> {
    if rows.is_empty() {
        return Err(RetrofitError::EmptyInput);
    }

    let missing = schema.missing_features(|column| rows.iter().any(|row| row.contains_key(column)));
    if !missing.is_empty() {
        return Err(RetrofitError::MissingFeatures(missing));
    }

    if scaler.n_features() != schema.width() {
        return Err(RetrofitError::ShapeMismatch(format!(
            "scaler fitted on {} columns, schema lists {}",
            scaler.n_features(),
            schema.width()
        )));
    }

    let plan: Vec<ColumnPlan<'_>> = schema
        .feature_columns
        .iter()
        .map(|column| match encoders.get(column) {
            Some(encoder) if schema.is_categorical(column) => ColumnPlan::Encoded(encoder),
            _ if schema.is_numerical(column) => ColumnPlan::Numerical,
            _ => ColumnPlan::Passthrough,
        })
        .collect();

    let width = schema.width();
    let mut data = Vec::with_capacity(rows.len() * width);

    for (row_idx, row) in rows.iter().enumerate() {
        for (column, plan) in schema.feature_columns.iter().zip(&plan) {
            let cell = row.get(column).filter(|cell| !cell.is_missing());

            let value = match plan {
                ColumnPlan::Encoded(encoder) => {
                    let code = match cell {
                        Some(cell) => encoder.encode(&cell.category_key()),
                        None => 0,
                    };
                    code as f64
                }
                ColumnPlan::Numerical => match cell {
                    Some(cell) => {
                        let value = parse_cell(cell, column, row_idx)?;
                        if value.is_nan() {
                            0.0
                        } else {
                            value
                        }
                    }
                    None => 0.0,
                },
                ColumnPlan::Passthrough => match cell {
                    Some(cell) => parse_cell(cell, column, row_idx)?,
                    None => f64::NAN,
                },
            };

            data.push(value);
        }

        let start = row_idx * width;
        scaler.transform_row(&mut data[start..start + width]);
    }

    debug!(rows = rows.len(), columns = width, "Prepared samples for prediction");

    AlignedMatrix::new(schema.feature_columns.clone(), data)
}

fn parse_cell(cell: &CellValue, column: &str, row: usize) -> Result<f64> {
    cell.as_f64().ok_or_else(|| RetrofitError::InvalidValue {
        column: column.to_string(),
        row,
        value: cell.category_key(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema {
            feature_columns: vec!["type".into(), "sqft".into(), "floors".into()],
            categorical_features: ["type".to_string()].into_iter().collect(),
            numerical_features: ["sqft".to_string(), "floors".to_string()].into_iter().collect(),
        }
    }

    fn encoders() -> EncoderSet {
        let mut set = EncoderSet::new();
        set.insert("type".into(), LabelEncoder::new(["Office", "Retail", "School"]));
        set
    }

    fn identity() -> FeatureScaler {
        FeatureScaler::Standard {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        }
    }

    fn row(pairs: &[(&str, CellValue)]) -> InputRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn projects_encodes_and_imputes() {
        let rows = vec![
            row(&[
                ("floors", CellValue::Number(3.0)),
                ("extra", CellValue::from("ignored")),
                ("type", CellValue::from("School")),
                ("sqft", CellValue::Null),
            ]),
            row(&[
                ("type", CellValue::from("Warehouse")),
                ("sqft", CellValue::from("1200.5")),
                ("floors", CellValue::Number(f64::NAN)),
            ]),
        ];

        let matrix = align(&rows, &schema(), &encoders(), &identity()).unwrap();
        assert_eq!(matrix.n_rows(), 2);
        assert_eq!(matrix.n_cols(), 3);
        assert_eq!(matrix.row(0).unwrap(), &[2.0, 0.0, 3.0]);
        assert_eq!(matrix.row(1).unwrap(), &[0.0, 1200.5, 0.0]);
    }

    #[test]
    fn missing_categorical_uses_first_class() {
        let rows = vec![row(&[
            ("type", CellValue::Null),
            ("sqft", CellValue::Number(1.0)),
            ("floors", CellValue::Number(1.0)),
        ])];
        let matrix = align(&rows, &schema(), &encoders(), &identity()).unwrap();
        assert_eq!(matrix.row(0).unwrap()[0], 0.0);
    }

    #[test]
    fn reports_every_missing_column() {
        let rows = vec![row(&[("sqft", CellValue::Number(1.0))])];
        match align(&rows, &schema(), &encoders(), &identity()) {
            Err(RetrofitError::MissingFeatures(missing)) => {
                assert_eq!(missing, vec!["type".to_string(), "floors".to_string()]);
            }
            other => panic!("expected MissingFeatures, got {other:?}"),
        }
    }

    #[test]
    fn scaling_runs_after_encoding() {
        let scaler = FeatureScaler::Standard {
            mean: vec![1.0, 100.0, 0.0],
            scale: vec![0.5, 10.0, 1.0],
        };
        let rows = vec![row(&[
            ("type", CellValue::from("Retail")),
            ("sqft", CellValue::Null),
            ("floors", CellValue::Number(2.0)),
        ])];
        let matrix = align(&rows, &schema(), &encoders(), &scaler).unwrap();
        // Retail -> 1 -> (1 - 1) / 0.5; sqft missing -> 0 -> (0 - 100) / 10
        assert_eq!(matrix.row(0).unwrap(), &[0.0, -10.0, 2.0]);
    }

    #[test]
    fn invalid_numeric_text_is_rejected() {
        let rows = vec![row(&[
            ("type", CellValue::from("Office")),
            ("sqft", CellValue::from("large")),
            ("floors", CellValue::Number(1.0)),
        ])];
        assert!(matches!(
            align(&rows, &schema(), &encoders(), &identity()),
            Err(RetrofitError::InvalidValue { row: 0, .. })
        ));
    }

    #[test]
    fn scaler_width_must_match_schema() {
        let narrow = FeatureScaler::Standard {
            mean: vec![0.0],
            scale: vec![1.0],
        };
        let rows = vec![row(&[
            ("type", CellValue::from("Office")),
            ("sqft", CellValue::Number(1.0)),
            ("floors", CellValue::Number(1.0)),
        ])];
        assert!(matches!(
            align(&rows, &schema(), &encoders(), &narrow),
            Err(RetrofitError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            align(&[], &schema(), &encoders(), &identity()),
            Err(RetrofitError::EmptyInput)
        ));
    }

    #[test]
    fn numeric_category_keys() {
        assert_eq!(CellValue::Number(3.0).category_key(), "3");
        assert_eq!(CellValue::Number(2.5).category_key(), "2.5");
        assert_eq!(CellValue::Bool(true).category_key(), "True");
        assert_eq!(CellValue::Number(f64::NAN).to_string(), "");
    }

    #[test]
    fn cells_deserialize_from_json() {
        let parsed: InputRow =
            serde_json::from_str(r#"{"a": 1.5, "b": "x", "c": null, "d": true}"#).unwrap();
        assert_eq!(parsed["a"], CellValue::Number(1.5));
        assert_eq!(parsed["b"], CellValue::from("x"));
        assert_eq!(parsed["c"], CellValue::Null);
        assert_eq!(parsed["d"], CellValue::Bool(true));
    }
}
