//! Shared fixtures for integration tests

use fraud_scoring::config::{AppConfig, TrainingConfig};
use fraud_scoring::models::{ArtifactStore, Trainer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::io::Write;
use std::path::Path;

pub const COMPONENTS: usize = 28;

/// Write a labeled dataset shaped like the card-transaction history:
/// `Time, V1..V28, Amount, Class`. Fraud rows are pushed along V1 and V3
/// and carry large amounts.
pub fn write_dataset(path: &Path, rows: usize, fraud_rate: f64, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut file = std::fs::File::create(path).unwrap();

    let mut header = vec!["Time".to_string()];
    header.extend((1..=COMPONENTS).map(|i| format!("V{i}")));
    header.push("Amount".into());
    header.push("Class".into());
    writeln!(file, "{}", header.join(",")).unwrap();

    for row in 0..rows {
        let fraud = rng.gen_bool(fraud_rate);
        let mut fields = vec![row.to_string()];
        for i in 1..=COMPONENTS {
            let value: f64 = match (fraud, i) {
                (true, 1) => rng.gen_range(-7.0..-3.0),
                (true, 3) => rng.gen_range(3.0..7.0),
                _ => rng.gen_range(-1.5..1.5),
            };
            fields.push(format!("{value:.6}"));
        }
        let amount: f64 = if fraud {
            rng.gen_range(2000.0..10000.0)
        } else {
            rng.gen_range(1.0..500.0)
        };
        fields.push(format!("{amount:.2}"));
        fields.push(if fraud { "1" } else { "0" }.to_string());
        writeln!(file, "{}", fields.join(",")).unwrap();
    }
}

/// Configuration rooted in `dir` with a freshly written dataset
pub fn config_in(dir: &Path) -> AppConfig {
    let dataset_path = dir.join("creditcard.csv");
    write_dataset(&dataset_path, 1200, 0.05, 7);

    let mut config = AppConfig::default();
    config.model.artifacts_dir = dir.join("models");
    config.training = TrainingConfig {
        dataset_path,
        ..TrainingConfig::default()
    };
    config
}

pub fn store_for(config: &AppConfig) -> ArtifactStore {
    ArtifactStore::new(
        config.model.artifacts_dir.clone(),
        Trainer::new(config.training.clone()),
    )
}

/// Feature mapping with every component set to `component` and the given amount
pub fn features(component: f64, amount: f64) -> fraud_scoring::RawFeatures {
    let mut features = fraud_scoring::RawFeatures::new();
    for i in 1..=COMPONENTS {
        features.insert(format!("V{i}"), json!(component));
    }
    features.insert("Amount".into(), json!(amount));
    features
}
