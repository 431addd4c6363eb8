//! Feature engineering for model inference.
//!
//! Each domain turns a validated raw record into the fixed-order numeric
//! vector its estimator was trained on. Categorical encoding never fails:
//! every fallback is reported on the vector instead of raised.

pub mod credit_card;
pub mod online_payment;

use crate::models::encoder::Encoder;
use crate::types::{Domain, RawRecord};
use serde_json::Value;
use std::collections::BTreeMap;

/// Why a categorical value was not encoded by a fitted encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Value absent from the fitted encoder's vocabulary
    UnseenValue,
    /// Encoder map present but has no entry for this field
    MissingFieldEncoder,
    /// No usable encoder; built-in mapping applied
    BuiltinMapping,
    /// No encoder map at all; hashed into a bounded range
    Hashed,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::UnseenValue => "unseen_value",
            FallbackReason::MissingFieldEncoder => "missing_field_encoder",
            FallbackReason::BuiltinMapping => "builtin_mapping",
            FallbackReason::Hashed => "hashed",
        }
    }
}

/// Outcome of encoding one categorical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Fitted(i64),
    Fallback { value: i64, reason: FallbackReason },
}

impl Encoding {
    pub fn value(&self) -> i64 {
        match *self {
            Encoding::Fitted(value) | Encoding::Fallback { value, .. } => value,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match *self {
            Encoding::Fitted(_) => None,
            Encoding::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// A categorical field that was encoded with a fallback value
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFallback {
    pub field: &'static str,
    pub reason: FallbackReason,
}

/// Ordered model input for one record
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub domain: Domain,
    names: &'static [&'static str],
    values: Vec<f64>,
    fallbacks: Vec<FieldFallback>,
}

impl FeatureVector {
    pub fn new(domain: Domain, names: &'static [&'static str], values: Vec<f64>) -> Self {
        Self {
            domain,
            names,
            values,
            fallbacks: Vec::new(),
        }
    }

    pub(crate) fn push_fallback(&mut self, field: &'static str, reason: FallbackReason) {
        self.fallbacks.push(FieldFallback { field, reason });
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn fallbacks(&self) -> &[FieldFallback] {
        &self.fallbacks
    }

    /// Realized features keyed by name
    pub fn named(&self) -> BTreeMap<String, f64> {
        self.names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }
}

/// Build the feature vector for `domain` from a validated record.
pub fn build(domain: Domain, record: &RawRecord, encoder: Option<&Encoder>) -> FeatureVector {
    match domain {
        Domain::OnlinePayment => online_payment::extract(record, encoder),
        Domain::CreditCard => credit_card::extract(record, encoder),
    }
}

/// Feature names for `domain`, in model input order
pub fn feature_names(domain: Domain) -> &'static [&'static str] {
    match domain {
        Domain::OnlinePayment => &online_payment::FEATURE_NAMES,
        Domain::CreditCard => &credit_card::FEATURE_NAMES,
    }
}

/// Numeric field value; validation guarantees presence, absent reads as 0.0.
pub(crate) fn numeric(record: &RawRecord, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// String form of a field as the encoder was fitted on.
pub(crate) fn stringify(record: &RawRecord, field: &str) -> String {
    match record.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
