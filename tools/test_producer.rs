//! Test Feature Producer
//!
//! Generates feature mappings (`V1`..`V28`, `Amount`) and publishes them to
//! NATS for exercising the scoring service.

use rand::Rng;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Number of anonymized components in a feature mapping
const COMPONENTS: usize = 28;

/// Feature mapping generator for testing
struct FeatureGenerator {
    rng: rand::rngs::ThreadRng,
}

impl FeatureGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Standard normal sample (Box-Muller)
    fn gaussian(&mut self) -> f64 {
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn components(&mut self) -> Map<String, Value> {
        (1..=COMPONENTS)
            .map(|i| (format!("V{i}"), json!(self.gaussian())))
            .collect()
    }

    /// Typical card-present purchase
    fn generate_legitimate(&mut self) -> Map<String, Value> {
        let mut features = self.components();
        let amount = (self.rng.gen_range(1.0..500.0_f64) * 100.0).round() / 100.0;
        features.insert("Amount".to_string(), json!(amount));
        features
    }

    /// Components pushed the way fraudulent history skews them
    fn generate_suspicious(&mut self) -> Map<String, Value> {
        let mut features = self.components();
        for (name, shift) in [("V4", 4.0), ("V10", -5.0), ("V12", -6.0), ("V14", -8.0), ("V17", -6.0)] {
            let value = shift + self.gaussian();
            features.insert(name.to_string(), json!(value));
        }
        let amount = (self.rng.gen_range(1000.0..10000.0_f64) * 100.0).round() / 100.0;
        features.insert("Amount".to_string(), json!(amount));
        features
    }

    /// Mapping that fails validation
    fn generate_invalid(&mut self) -> Map<String, Value> {
        let mut features = self.generate_legitimate();
        match self.rng.gen_range(0..3) {
            0 => {
                features.remove("V7");
            }
            1 => {
                features.insert("Amount".to_string(), json!(0.0));
            }
            _ => {
                features.insert("V3".to_string(), json!("not-a-number"));
            }
        }
        features
    }

    fn generate(&mut self, fraud_rate: f64, invalid_rate: f64) -> (Map<String, Value>, &'static str) {
        let roll: f64 = self.rng.gen();
        if roll < invalid_rate {
            (self.generate_invalid(), "invalid")
        } else if roll < invalid_rate + fraud_rate {
            (self.generate_suspicious(), "suspicious")
        } else {
            (self.generate_legitimate(), "legitimate")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Feature Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let invalid_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.05);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        invalid_rate = invalid_rate,
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
            return run_dry_mode(count, fraud_rate, invalid_rate, delay_ms).await;
        }
    };

    let mut generator = FeatureGenerator::new();
    let mut counts = [0u64; 3];

    info!("Starting to publish {} feature mappings...", count);

    for i in 0..count {
        let (features, kind) = generator.generate(fraud_rate, invalid_rate);
        counts[match kind {
            "legitimate" => 0,
            "suspicious" => 1,
            _ => 2,
        }] += 1;

        let payload = serde_json::to_vec(&features)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} ({} legitimate, {} suspicious, {} invalid)",
                i + 1,
                count,
                counts[0],
                counts[1],
                counts[2]
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!(
        "Completed! Published {} ({} legitimate, {} suspicious, {} invalid)",
        count, counts[0], counts[1], counts[2]
    );

    Ok(())
}

async fn run_dry_mode(
    count: u64,
    fraud_rate: f64,
    invalid_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = FeatureGenerator::new();

    for i in 0..count {
        let (features, kind) = generator.generate(fraud_rate, invalid_rate);
        let json = serde_json::to_string_pretty(&features)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample {} ({}):\n{}", i + 1, kind, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
