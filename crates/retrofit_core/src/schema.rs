//! Training-time feature schema manifest

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Contents of `feature_columns_*.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    /// Model input columns, in matrix order
    pub feature_columns: Vec<String>,
    #[serde(default)]
    pub categorical_features: BTreeSet<String>,
    #[serde(default)]
    pub numerical_features: BTreeSet<String>,
}

impl FeatureSchema {
    pub fn width(&self) -> usize {
        self.feature_columns.len()
    }

    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_features.contains(column)
    }

    pub fn is_numerical(&self, column: &str) -> bool {
        self.numerical_features.contains(column)
    }

    /// Every feature column absent from `available`, in schema order
    pub fn missing_features<F>(&self, mut available: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        self.feature_columns
            .iter()
            .filter(|column| !available(column.as_str()))
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.feature_columns.is_empty() {
            return Err("schema lists no feature columns".to_string());
        }

        let mut seen = BTreeSet::new();
        for column in &self.feature_columns {
            if !seen.insert(column.as_str()) {
                return Err(format!("duplicate feature column {column:?}"));
            }
        }

        if let Some(both) = self
            .categorical_features
            .intersection(&self.numerical_features)
            .next()
        {
            return Err(format!("column {both:?} is both categorical and numerical"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        serde_json::from_str(
            r#"{"feature_columns":["a","b","c"],"categorical_features":["a"],"numerical_features":["b","c"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn reports_all_missing_in_order() {
        let schema = schema();
        let missing = schema.missing_features(|c| c == "b");
        assert_eq!(missing, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn classifies_columns() {
        let schema = schema();
        assert_eq!(schema.width(), 3);
        assert!(schema.is_categorical("a"));
        assert!(schema.is_numerical("c"));
        assert!(!schema.is_numerical("a"));
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn rejects_duplicates_and_overlap() {
        let mut dup = schema();
        dup.feature_columns.push("a".into());
        assert!(dup.validate().is_err());

        let mut overlap = schema();
        overlap.numerical_features.insert("a".into());
        assert!(overlap.validate().is_err());
    }
}
