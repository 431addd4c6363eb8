//! Per-domain input validation for raw transaction records.

use crate::types::{Domain, RawRecord};
use serde_json::Value;

/// Transaction types accepted by the online-payment model.
pub const ONLINE_PAYMENT_TYPES: [&str; 5] = ["PAYMENT", "TRANSFER", "CASH_OUT", "DEBIT", "CASH_IN"];

const ONLINE_PAYMENT_NUMERIC: [&str; 6] = [
    "step",
    "amount",
    "oldbalanceOrg",
    "newbalanceOrig",
    "oldbalanceDest",
    "newbalanceDest",
];

const CREDIT_CARD_NUMERIC: [&str; 6] = ["amt", "lat", "long", "city_pop", "merch_lat", "merch_long"];

const CREDIT_CARD_STRING: [&str; 5] = ["merchant", "category", "city", "state", "job"];

/// Returns true when the record satisfies every constraint of its domain.
pub fn validate(domain: Domain, record: &RawRecord) -> bool {
    validation_errors(domain, record).is_empty()
}

/// Lists every constraint violation in the record, in field order.
pub fn validation_errors(domain: Domain, record: &RawRecord) -> Vec<String> {
    match domain {
        Domain::OnlinePayment => online_payment_errors(record),
        Domain::CreditCard => credit_card_errors(record),
    }
}

fn online_payment_errors(record: &RawRecord) -> Vec<String> {
    let mut errors = Vec::new();

    match record.get("type") {
        None => errors.push("missing field: type".to_string()),
        Some(Value::String(t)) if ONLINE_PAYMENT_TYPES.contains(&t.as_str()) => {}
        Some(other) => errors.push(format!("type: unsupported transaction type {}", other)),
    }

    for field in ONLINE_PAYMENT_NUMERIC {
        match record.get(field) {
            None => errors.push(format!("missing field: {}", field)),
            Some(value) => match value.as_f64() {
                Some(n) if n >= 0.0 => {}
                Some(_) => errors.push(format!("{}: must be non-negative", field)),
                None => errors.push(format!("{}: must be a number", field)),
            },
        }
    }

    errors
}

fn credit_card_errors(record: &RawRecord) -> Vec<String> {
    let mut errors = Vec::new();

    for field in CREDIT_CARD_NUMERIC {
        match record.get(field) {
            None => errors.push(format!("missing field: {}", field)),
            Some(value) if value.as_f64().is_none() => {
                errors.push(format!("{}: must be a number", field))
            }
            Some(_) => {}
        }
    }

    if let Some(amt) = record.get("amt").and_then(Value::as_f64) {
        if amt <= 0.0 {
            errors.push("amt: must be greater than zero".to_string());
        }
    }

    for field in CREDIT_CARD_STRING {
        match record.get(field) {
            None => errors.push(format!("missing field: {}", field)),
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => errors.push(format!("{}: must not be blank", field)),
            Some(_) => errors.push(format!("{}: must be a string", field)),
        }
    }

    errors
}
