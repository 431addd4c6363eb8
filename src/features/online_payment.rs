//! Online-payment pipeline: five features in training column order.

use super::{numeric, stringify, Encoding, FallbackReason, FeatureVector};
use crate::models::encoder::{Encoder, LabelEncoder};
use crate::types::{Domain, RawRecord};
use tracing::warn;

pub const FEATURE_NAMES: [&str; 5] = ["step", "amount", "type_encoded", "diffOrig", "diffDest"];

/// Built-in transaction type codes, used whenever the encoder cannot answer.
pub const BUILTIN_TYPE_CODES: [(&str, i64); 5] = [
    ("PAYMENT", 0),
    ("TRANSFER", 1),
    ("CASH_OUT", 2),
    ("DEBIT", 3),
    ("CASH_IN", 4),
];

fn builtin_code(value: &str) -> i64 {
    BUILTIN_TYPE_CODES
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, code)| *code)
        .unwrap_or(0)
}

fn fitted_or_builtin(encoder: &LabelEncoder, value: &str) -> Encoding {
    match encoder.transform(value) {
        Ok(code) => Encoding::Fitted(code),
        Err(e) => {
            warn!(error = %e, "Unknown transaction type, using built-in mapping");
            Encoding::Fallback {
                value: builtin_code(value),
                reason: FallbackReason::UnseenValue,
            }
        }
    }
}

/// Encode the `type` field.
///
/// Priority: fitted encoder, then the encoder's plain mapping, then the
/// built-in codes (0 for anything outside them).
pub fn encode_type(value: &str, encoder: Option<&Encoder>) -> Encoding {
    match encoder {
        Some(Encoder::Fitted(fitted)) => fitted_or_builtin(fitted, value),
        Some(Encoder::FieldMap(fields)) if fields.contains_key("type") => {
            fitted_or_builtin(&fields["type"], value)
        }
        Some(Encoder::StaticMapping(mapping)) => match mapping.get(value) {
            Some(code) => Encoding::Fitted(*code),
            None => {
                warn!(value = %value, "Transaction type missing from mapping, using built-in mapping");
                Encoding::Fallback {
                    value: builtin_code(value),
                    reason: FallbackReason::UnseenValue,
                }
            }
        },
        Some(Encoder::FieldMap(_)) | None => Encoding::Fallback {
            value: builtin_code(value),
            reason: FallbackReason::BuiltinMapping,
        },
    }
}

/// Extract `[step, amount, type_encoded, diffOrig, diffDest]`.
///
/// The balance differences are zero for an internally consistent transfer;
/// the model learns on their deviation.
pub fn extract(record: &RawRecord, encoder: Option<&Encoder>) -> FeatureVector {
    let step = numeric(record, "step");
    let amount = numeric(record, "amount");
    let old_org = numeric(record, "oldbalanceOrg");
    let new_orig = numeric(record, "newbalanceOrig");
    let old_dest = numeric(record, "oldbalanceDest");
    let new_dest = numeric(record, "newbalanceDest");

    let type_encoding = encode_type(&stringify(record, "type"), encoder);

    let diff_orig = old_org - new_orig + amount;
    let diff_dest = new_dest - old_dest - amount;

    let mut vector = FeatureVector::new(
        Domain::OnlinePayment,
        &FEATURE_NAMES,
        vec![step, amount, type_encoding.value() as f64, diff_orig, diff_dest],
    );
    if let Some(reason) = type_encoding.fallback_reason() {
        vector.push_fallback("type", reason);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn record(kind: &str) -> RawRecord {
        json!({
            "step": 1,
            "type": kind,
            "amount": 9839.64,
            "oldbalanceOrg": 170136.0,
            "newbalanceOrig": 160296.36,
            "oldbalanceDest": 0.0,
            "newbalanceDest": 0.0
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn sorted_label_encoder() -> Encoder {
        // Alphabetical class order, as a fitted label encoder stores them
        Encoder::Fitted(LabelEncoder::from_classes(
            ["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "TRANSFER"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ))
    }

    #[test]
    fn test_reference_transaction_with_builtin_mapping() {
        let vector = extract(&record("PAYMENT"), None);
        let v = vector.values();

        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[1], 9839.64);
        assert_eq!(v[2], 0.0);
        assert!((v[3] - 19679.28).abs() < 1e-6);
        assert!((v[4] + 9839.64).abs() < 1e-9);
        assert_eq!(vector.fallbacks()[0].reason, FallbackReason::BuiltinMapping);
    }

    #[test]
    fn test_builtin_codes_for_every_type() {
        for (kind, code) in BUILTIN_TYPE_CODES {
            let vector = extract(&record(kind), None);
            assert_eq!(vector.values()[2], code as f64, "type {}", kind);
        }
    }

    #[test]
    fn test_fitted_encoder_takes_priority() {
        let encoder = sorted_label_encoder();
        let vector = extract(&record("PAYMENT"), Some(&encoder));

        assert_eq!(vector.values()[2], 3.0);
        assert!(vector.fallbacks().is_empty());
    }

    #[test]
    fn test_unseen_type_falls_back_to_builtin() {
        let encoder = Encoder::Fitted(LabelEncoder::from_classes(vec!["PAYMENT".to_string()]));
        let vector = extract(&record("CASH_OUT"), Some(&encoder));

        assert_eq!(vector.values()[2], 2.0);
        assert_eq!(vector.fallbacks()[0].reason, FallbackReason::UnseenValue);
    }

    #[test]
    fn test_static_mapping() {
        let mut mapping = HashMap::new();
        mapping.insert("TRANSFER".to_string(), 7);
        let encoder = Encoder::StaticMapping(mapping);

        assert_eq!(encode_type("TRANSFER", Some(&encoder)), Encoding::Fitted(7));
        assert_eq!(encode_type("DEBIT", Some(&encoder)).value(), 3);
    }

    #[test]
    fn test_unknown_value_without_encoder_is_zero() {
        assert_eq!(encode_type("WIRE", None).value(), 0);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let encoder = sorted_label_encoder();
        let r = record("CASH_IN");
        assert_eq!(extract(&r, Some(&encoder)), extract(&r, Some(&encoder)));
        assert_eq!(extract(&r, None), extract(&r, None));
    }
}
