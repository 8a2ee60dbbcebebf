//! Categorical label encoders

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fitted mapping from category strings to integer codes.
///
/// The code of a class is its position in `classes`. The first class doubles
/// as the fallback for missing and unseen values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Code of `value`, or the fallback class's code when unseen
    pub fn encode(&self, value: &str) -> usize {
        self.classes
            .iter()
            .position(|class| class == value)
            .unwrap_or(0)
    }
}

/// Column name → encoder, as stored in `label_encoders_*.json`
pub type EncoderSet = BTreeMap<String, LabelEncoder>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_classes_encode_to_position() {
        let encoder = LabelEncoder::new(["Hospital", "Office", "School"]);
        assert_eq!(encoder.encode("Hospital"), 0);
        assert_eq!(encoder.encode("School"), 2);
        assert_eq!(encoder.encode("Office"), 1);
    }

    #[test]
    fn unknown_classes_fall_back_to_first() {
        let encoder = LabelEncoder::new(["B", "C"]);
        assert_eq!(encoder.encode("Z"), 0);
        assert_eq!(encoder.encode("Z"), encoder.encode("Z"));
        assert_eq!(encoder.encode("B"), 0);
    }

    #[test]
    fn encoder_set_from_json() {
        let set: EncoderSet =
            serde_json::from_str(r#"{"climate":{"classes":["4A","5A"]},"type":{"classes":["x"]}}"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set["climate"].encode("5A"), 1);
    }
}
