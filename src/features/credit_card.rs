//! Credit-card pipeline: six numeric features followed by five encoded
//! categorical features.

use super::{numeric, stringify, Encoding, FallbackReason, FeatureVector};
use crate::models::encoder::{Encoder, LabelEncoder};
use crate::types::{Domain, RawRecord};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

pub const NUMERIC_FIELDS: [&str; 6] = ["amt", "lat", "long", "city_pop", "merch_lat", "merch_long"];

pub const CATEGORICAL_FIELDS: [&str; 5] = ["merchant", "category", "city", "state", "job"];

pub const FEATURE_NAMES: [&str; 11] = [
    "amt",
    "lat",
    "long",
    "city_pop",
    "merch_lat",
    "merch_long",
    "merchant_encoded",
    "category_encoded",
    "city_encoded",
    "state_encoded",
    "job_encoded",
];

/// Range of the hash fallback codes
pub const HASH_BUCKETS: u64 = 1000;

/// Stable bounded code for a category when no encoders are available.
///
/// Lower fidelity than a trained encoding: codes do not match the values the
/// model saw in training.
pub fn hash_code(value: &str) -> i64 {
    let normalized = value.trim().to_lowercase();
    let mut h = Sha256::new();
    h.update(normalized.as_bytes());
    let digest = h.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % HASH_BUCKETS) as i64
}

fn encode_field(
    field: &'static str,
    value: &str,
    encoders: Option<&HashMap<String, LabelEncoder>>,
) -> Encoding {
    let Some(encoders) = encoders else {
        return Encoding::Fallback {
            value: hash_code(value),
            reason: FallbackReason::Hashed,
        };
    };

    match encoders.get(field) {
        Some(encoder) => match encoder.transform(value) {
            Ok(code) => {
                debug!(field, value = %value, code, "Encoded categorical feature");
                Encoding::Fitted(code)
            }
            Err(e) => {
                warn!(field, error = %e, "Unknown category, using 0");
                Encoding::Fallback {
                    value: 0,
                    reason: FallbackReason::UnseenValue,
                }
            }
        },
        None => {
            warn!(field, "No encoder found for field, using 0");
            Encoding::Fallback {
                value: 0,
                reason: FallbackReason::MissingFieldEncoder,
            }
        }
    }
}

/// Extract the 11-feature vector in training column order.
///
/// Any non-empty keyed artifact is read as per-field encoders. A value-to-code
/// mapping holds no fitted encoder for any field, so every category encodes
/// as 0. Hashing applies only when no keyed artifact is available.
pub fn extract(record: &RawRecord, encoder: Option<&Encoder>) -> FeatureVector {
    let no_fields = HashMap::new();
    let encoders = match encoder {
        Some(Encoder::FieldMap(fields)) if !fields.is_empty() => Some(fields),
        Some(Encoder::StaticMapping(mapping)) if !mapping.is_empty() => {
            warn!("Encoder artifact is a plain mapping, no per-field encoders available");
            Some(&no_fields)
        }
        _ => {
            warn!("Label encoders not available, using hash-based fallback");
            None
        }
    };

    let mut values: Vec<f64> = NUMERIC_FIELDS.iter().map(|f| numeric(record, f)).collect();
    let mut fallbacks = Vec::new();

    for field in CATEGORICAL_FIELDS {
        let encoding = encode_field(field, &stringify(record, field), encoders);
        values.push(encoding.value() as f64);
        if let Some(reason) = encoding.fallback_reason() {
            fallbacks.push((field, reason));
        }
    }

    let mut vector = FeatureVector::new(Domain::CreditCard, &FEATURE_NAMES, values);
    for (field, reason) in fallbacks {
        vector.push_fallback(field, reason);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> RawRecord {
        json!({
            "merchant": "fraud_Rippin, Kub and Mann",
            "category": "misc_net",
            "amt": 4.97,
            "city": "Malton",
            "state": "OH",
            "lat": 39.9459,
            "long": -82.1661,
            "city_pop": 35,
            "job": "Psychologist, counselling",
            "merch_lat": 39.9459,
            "merch_long": -82.1661
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn classes(values: &[&str]) -> LabelEncoder {
        LabelEncoder::from_classes(values.iter().map(|s| s.to_string()).collect())
    }

    fn full_encoders() -> Encoder {
        let mut fields = HashMap::new();
        fields.insert("merchant".to_string(), classes(&["a", "fraud_Rippin, Kub and Mann"]));
        fields.insert("category".to_string(), classes(&["gas", "grocery", "misc_net"]));
        fields.insert("city".to_string(), classes(&["Malton"]));
        fields.insert("state".to_string(), classes(&["CA", "NY", "OH"]));
        fields.insert("job".to_string(), classes(&["Chef", "Psychologist, counselling"]));
        Encoder::FieldMap(fields)
    }

    #[test]
    fn test_numeric_prefix_matches_input() {
        let vector = extract(&record(), Some(&full_encoders()));
        let v = vector.values();

        assert_eq!(v.len(), 11);
        assert_eq!(&v[..6], &[4.97, 39.9459, -82.1661, 35.0, 39.9459, -82.1661]);
    }

    #[test]
    fn test_fitted_encoders() {
        let vector = extract(&record(), Some(&full_encoders()));

        assert_eq!(&vector.values()[6..], &[1.0, 2.0, 0.0, 2.0, 1.0]);
        assert!(vector.fallbacks().is_empty());
    }

    #[test]
    fn test_unseen_category_is_zero() {
        let mut r = record();
        r.insert("state".to_string(), json!("TX"));

        let vector = extract(&r, Some(&full_encoders()));
        assert_eq!(vector.values()[9], 0.0);
        assert_eq!(vector.values()[10], 1.0);
        assert_eq!(vector.fallbacks().len(), 1);
        assert_eq!(vector.fallbacks()[0].field, "state");
        assert_eq!(vector.fallbacks()[0].reason, FallbackReason::UnseenValue);
    }

    #[test]
    fn test_missing_field_encoder_is_zero() {
        let mut fields = HashMap::new();
        fields.insert("merchant".to_string(), classes(&["fraud_Rippin, Kub and Mann"]));
        let vector = extract(&record(), Some(&Encoder::FieldMap(fields)));

        assert_eq!(vector.values()[6], 0.0);
        assert_eq!(&vector.values()[7..], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(vector.fallbacks().len(), 4);
    }

    #[test]
    fn test_hash_fallback_without_encoders() {
        let vector = extract(&record(), None);

        for (i, field) in CATEGORICAL_FIELDS.iter().enumerate() {
            let expected = hash_code(record()[*field].as_str().unwrap());
            assert_eq!(vector.values()[6 + i], expected as f64);
            assert!(expected >= 0 && expected < HASH_BUCKETS as i64);
        }
        assert!(vector
            .fallbacks()
            .iter()
            .all(|f| f.reason == FallbackReason::Hashed));
    }

    #[test]
    fn test_hash_code_normalizes_case_and_whitespace() {
        assert_eq!(hash_code("  Malton "), hash_code("malton"));
        assert_eq!(hash_code("OH"), hash_code("oh"));
    }

    #[test]
    fn test_wrong_encoder_shape_uses_hash() {
        let encoder = Encoder::Fitted(classes(&["PAYMENT"]));
        assert_eq!(extract(&record(), Some(&encoder)), extract(&record(), None));

        let empty = Encoder::FieldMap(HashMap::new());
        assert_eq!(extract(&record(), Some(&empty)), extract(&record(), None));
    }

    #[test]
    fn test_plain_mapping_encodes_every_category_as_zero() {
        let mut mapping = HashMap::new();
        mapping.insert("merchant".to_string(), 3);
        let vector = extract(&record(), Some(&Encoder::StaticMapping(mapping)));

        assert_eq!(&vector.values()[6..], &[0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(vector.fallbacks().len(), 5);
        assert!(vector
            .fallbacks()
            .iter()
            .all(|f| f.reason == FallbackReason::MissingFieldEncoder));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let encoders = full_encoders();
        assert_eq!(
            extract(&record(), Some(&encoders)),
            extract(&record(), Some(&encoders))
        );
        assert_eq!(extract(&record(), None), extract(&record(), None));
    }
}
