//! Labeled historical transactions and the train/evaluation split

use crate::config::TrainingConfig;
use crate::error::ArtifactError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::info;

/// Feature matrix with binary labels, columns in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl Dataset {
    /// Load a CSV dataset.
    ///
    /// The label column is required; columns listed in `drop_columns` are
    /// skipped when present. Every other column becomes a feature.
    pub fn from_csv(path: &Path, config: &TrainingConfig) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::DatasetMissing(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let label_index = headers
            .iter()
            .position(|h| h == config.label_column)
            .ok_or_else(|| {
                ArtifactError::Dataset(format!("label column {} not found", config.label_column))
            })?;

        let feature_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| *i != label_index && !config.drop_columns.iter().any(|d| d == h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        if feature_columns.is_empty() {
            return Err(ArtifactError::Dataset("dataset has no feature columns".into()));
        }

        let mut rows = Vec::new();
        let mut labels = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let parse = |index: usize, column: &str| -> Result<f64, ArtifactError> {
                record
                    .get(index)
                    .and_then(|field| field.trim().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        ArtifactError::Dataset(format!(
                            "row {}: column {} is not a finite number",
                            line + 1,
                            column
                        ))
                    })
            };

            let label = parse(label_index, &config.label_column)?;
            let row = feature_columns
                .iter()
                .map(|(index, name)| parse(*index, name))
                .collect::<Result<Vec<f64>, _>>()?;

            rows.push(row);
            labels.push(label != 0.0);
        }

        let dataset = Self {
            feature_names: feature_columns.into_iter().map(|(_, name)| name).collect(),
            rows,
            labels,
        };

        info!(
            path = %path.display(),
            rows = dataset.len(),
            features = dataset.feature_names.len(),
            positives = dataset.positives(),
            "Historical dataset loaded"
        );

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of fraud rows
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Split into training and held-out partitions, stratified on the label.
    ///
    /// Each class contributes `round(count * test_fraction)` rows to the
    /// held-out partition (at least one, never all). The shuffle is seeded,
    /// so the split is reproducible.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<Split, ArtifactError> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(ArtifactError::Training(format!(
                "test fraction {test_fraction} must lie in (0, 1)"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in [false, true] {
            let mut indices: Vec<usize> = (0..self.len())
                .filter(|&i| self.labels[i] == class)
                .collect();

            if indices.len() < 2 {
                return Err(ArtifactError::Training(format!(
                    "class {} has {} rows, stratified split needs at least 2",
                    u8::from(class),
                    indices.len()
                )));
            }

            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * test_fraction).round() as usize)
                .clamp(1, indices.len() - 1);

            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        train.sort_unstable();
        test.sort_unstable();

        Ok(Split {
            train: self.subset(&train),
            test: self.subset(&test),
        })
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Training and held-out partitions
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}
