//! Test Prediction Requester
//!
//! Generates online-payment and credit-card records and sends them as NATS
//! requests to the fraud risk service, logging each reply.

use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Record generator for both domains
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
    step: u64,
}

impl RecordGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            step: 0,
        }
    }

    /// Online payment, draining the origin account when `suspicious`
    fn online_payment(&mut self, suspicious: bool) -> Value {
        self.step += 1;

        let tx_type = if suspicious {
            self.random_choice(&["TRANSFER", "CASH_OUT"])
        } else {
            self.random_choice(&["PAYMENT", "DEBIT", "CASH_IN", "TRANSFER", "CASH_OUT"])
        };
        let old_balance_org: f64 = self.rng.gen_range(1000.0..200000.0);
        let amount = if suspicious {
            old_balance_org
        } else {
            self.rng.gen_range(10.0..old_balance_org.min(5000.0))
        };
        let old_balance_dest: f64 = self.rng.gen_range(0.0..100000.0);
        let new_balance_dest = if suspicious {
            old_balance_dest
        } else {
            old_balance_dest + amount
        };

        json!({
            "step": self.step,
            "type": tx_type,
            "amount": amount,
            "oldbalanceOrg": old_balance_org,
            "newbalanceOrig": old_balance_org - amount,
            "oldbalanceDest": old_balance_dest,
            "newbalanceDest": new_balance_dest,
        })
    }

    /// Card purchase; suspicious ones are large and far from the cardholder
    fn credit_card(&mut self, suspicious: bool) -> Value {
        let lat: f64 = self.rng.gen_range(25.0..48.0);
        let long: f64 = self.rng.gen_range(-122.0..-70.0);
        let (amt, offset) = if suspicious {
            (self.rng.gen_range(800.0..3000.0), self.rng.gen_range(1.0..5.0))
        } else {
            (self.rng.gen_range(1.0..250.0), self.rng.gen_range(0.0..0.5))
        };
        let category = if suspicious {
            self.random_choice(&["shopping_net", "misc_net", "grocery_pos"])
        } else {
            self.random_choice(&["grocery_pos", "gas_transport", "home", "kids_pets"])
        };

        json!({
            "amt": amt,
            "lat": lat,
            "long": long,
            "city_pop": self.rng.gen_range(500..2_000_000),
            "merch_lat": lat + offset,
            "merch_long": long - offset,
            "merchant": format!("fraud_{}", self.random_choice(&["Kirlin and Sons", "Sporer-Keebler", "Haley Group", "Lind-Buckridge"])),
            "category": category,
            "city": self.random_choice(&["Columbia", "Altonah", "Bellmore", "Titusville"]),
            "state": self.random_choice(&["SC", "UT", "NY", "FL"]),
            "job": self.random_choice(&["Mechanical engineer", "Sales professional, IT", "Librarian, public"]),
        })
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Requester");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let prefix = args.get(2).map(|s| s.as_str()).unwrap_or("fraud");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        prefix = %prefix,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    for subject in [format!("{}.health", prefix), format!("{}.models.status", prefix)] {
        match client.request(subject.clone(), Vec::<u8>::new().into()).await {
            Ok(reply) => info!(subject = %subject, reply = %String::from_utf8_lossy(&reply.payload), "Status reply"),
            Err(e) => warn!(subject = %subject, error = %e, "Status request failed"),
        }
    }

    let mut generator = RecordGenerator::new();
    let mut rng = rand::thread_rng();

    let mut flagged = 0u64;
    let mut errors = 0u64;

    for i in 0..count {
        let suspicious = rng.gen_bool(fraud_rate);
        let (subject, record) = if i % 2 == 0 {
            (format!("{}.predict.online-payment", prefix), generator.online_payment(suspicious))
        } else {
            (format!("{}.predict.credit-card", prefix), generator.credit_card(suspicious))
        };

        let payload = serde_json::to_vec(&record)?;
        let reply = match client.request(subject.clone(), payload.into()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Request failed");
                errors += 1;
                continue;
            }
        };

        let body: Value = serde_json::from_slice(&reply.payload)?;
        if let Some(error) = body.get("error") {
            errors += 1;
            warn!(subject = %subject, error = %error, "Prediction rejected");
        } else {
            if body["is_fraud"].as_bool().unwrap_or(false) {
                flagged += 1;
            }
            info!(
                subject = %subject,
                suspicious,
                is_fraud = %body["is_fraud"],
                fraud_probability = %body["fraud_probability"],
                risk_score = %body["risk_score"],
                "Prediction received"
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} flagged as fraud, {} errors)",
        count, flagged, errors
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RecordGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let suspicious = rng.gen_bool(fraud_rate);
        let record = if i % 2 == 0 {
            generator.online_payment(suspicious)
        } else {
            generator.credit_card(suspicious)
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample record {}:\n{}", i + 1, serde_json::to_string_pretty(&record)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
