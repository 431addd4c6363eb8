//! Categorical encoder artifacts.
//!
//! Encoders are resolved once at load time into one of three shapes so the
//! feature pipelines never probe types on the request path.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Raised when a value was not part of the encoder's training vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value not seen during fitting: {0:?}")]
pub struct UnseenValue(pub String);

/// Fitted label encoder: code is the class index in `classes` order.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    codes: HashMap<String, i64>,
}

impl LabelEncoder {
    pub fn from_classes(classes: Vec<String>) -> Self {
        let mut codes = HashMap::with_capacity(classes.len());
        for (index, class) in classes.iter().enumerate() {
            codes.entry(class.clone()).or_insert(index as i64);
        }
        Self { codes }
    }

    pub fn transform(&self, value: &str) -> Result<i64, UnseenValue> {
        self.codes
            .get(value)
            .copied()
            .ok_or_else(|| UnseenValue(value.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.codes.len()
    }
}

/// A loaded encoder in one of its resolved shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoder {
    /// Single fitted encoder (one categorical field)
    Fitted(LabelEncoder),
    /// Plain value-to-code mapping
    StaticMapping(HashMap<String, i64>),
    /// Fitted encoder per categorical field name
    FieldMap(HashMap<String, LabelEncoder>),
}

/// On-disk JSON layout of an encoder artifact.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EncoderArtifact {
    Classes(Vec<String>),
    Mapping(HashMap<String, i64>),
    Fields(HashMap<String, Vec<String>>),
}

impl Encoder {
    /// Load an encoder artifact from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read encoder from {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("Failed to parse encoder {:?}", path))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let artifact: EncoderArtifact =
            serde_json::from_str(data).context("Unrecognized encoder artifact layout")?;

        Ok(match artifact {
            EncoderArtifact::Classes(classes) => Encoder::Fitted(LabelEncoder::from_classes(classes)),
            EncoderArtifact::Mapping(mapping) => Encoder::StaticMapping(mapping),
            EncoderArtifact::Fields(fields) => Encoder::FieldMap(
                fields
                    .into_iter()
                    .map(|(field, classes)| (field, LabelEncoder::from_classes(classes)))
                    .collect(),
            ),
        })
    }

    /// Known categories across every encoder in the artifact
    pub fn class_count(&self) -> usize {
        match self {
            Encoder::Fitted(encoder) => encoder.len(),
            Encoder::StaticMapping(mapping) => mapping.len(),
            Encoder::FieldMap(fields) => fields.values().map(LabelEncoder::len).sum(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Encoder::Fitted(_) => "fitted",
            Encoder::StaticMapping(_) => "static_mapping",
            Encoder::FieldMap(_) => "field_map",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_encoder_transform() {
        let encoder = LabelEncoder::from_classes(vec![
            "CASH_IN".to_string(),
            "CASH_OUT".to_string(),
            "DEBIT".to_string(),
        ]);

        assert_eq!(encoder.transform("CASH_OUT"), Ok(1));
        assert_eq!(encoder.transform("WIRE"), Err(UnseenValue("WIRE".to_string())));
        assert_eq!(encoder.len(), 3);
    }

    #[test]
    fn test_artifact_shapes() {
        let fitted = Encoder::from_json(r#"["CASH_IN", "PAYMENT"]"#).unwrap();
        assert_eq!(fitted.kind(), "fitted");

        let mapping = Encoder::from_json(r#"{"PAYMENT": 0, "TRANSFER": 1}"#).unwrap();
        match mapping {
            Encoder::StaticMapping(m) => assert_eq!(m.get("TRANSFER"), Some(&1)),
            other => panic!("expected static mapping, got {}", other.kind()),
        }

        let fields = Encoder::from_json(r#"{"state": ["CA", "OH"], "job": ["Chef"]}"#).unwrap();
        match fields {
            Encoder::FieldMap(m) => {
                assert_eq!(m.len(), 2);
                assert_eq!(m["state"].transform("OH"), Ok(1));
            }
            other => panic!("expected field map, got {}", other.kind()),
        }
        let fields = Encoder::from_json(r#"{"state": ["CA", "OH"], "job": ["Chef"]}"#).unwrap();
        assert_eq!(fields.class_count(), 3);
    }

    #[test]
    fn test_invalid_artifact_is_error() {
        assert!(Encoder::from_json("not json").is_err());
        assert!(Encoder::from_json(r#"{"a": "b"}"#).is_err());
        assert!(Encoder::load("does/not/exist.json").is_err());
    }
}
