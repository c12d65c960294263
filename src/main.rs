//! Fraud Scoring Service - Main Entry Point
//!
//! Loads (or trains) the model artifacts once, then scores feature mappings
//! received over NATS and publishes the results for persistence.

use anyhow::{Context, Result};
use fraud_scoring::{
    config::AppConfig,
    consumer::TransactionConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{ArtifactStore, Trainer},
    producer::ScoreProducer,
    service::ScoringService,
    types::{Rejection, ScoredRecord},
    RawFeatures, ScoringError,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    config.logging.init_tracing()?;

    info!("Starting Fraud Scoring Service");

    // Load artifacts once; a cold start trains synchronously before serving
    let store = ArtifactStore::new(
        config.model.artifacts_dir.clone(),
        Trainer::new(config.training.clone()),
    );
    let artifacts = tokio::task::spawn_blocking(move || store.load())
        .await
        .context("Artifact loading task panicked")?
        .context("Failed to load model artifacts")?;

    let service = Arc::new(ScoringService::new(
        artifacts,
        &config.model,
        &config.validation,
    )?);
    info!(
        features = service.artifacts().schema().len(),
        trained_at = %service.artifacts().metadata.training_timestamp,
        threshold = service.artifacts().metadata.threshold,
        "Scoring service ready"
    );

    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(
        client.clone(),
        &config.nats.transaction_subject,
        &config.nats.model_info_subject,
    );
    let producer = Arc::new(ScoreProducer::new(
        client.clone(),
        &config.nats.score_subject,
        &config.nats.rejection_subject,
    ));

    // Model info is request/reply only
    let mut info_requests = consumer.subscribe_model_info().await?;
    {
        let service = service.clone();
        let producer = producer.clone();
        tokio::spawn(async move {
            while let Some(message) = info_requests.next().await {
                let Some(reply) = message.reply else {
                    debug!("Model info request without reply subject ignored");
                    continue;
                };
                if let Err(e) = producer.reply(reply, &service.describe_model()).await {
                    error!(error = %e, "Failed to reply with model info");
                }
            }
        });
    }

    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        MetricsReporter::new(metrics_clone, interval).start().await;
    });

    let num_workers = config.pipeline.workers.max(1);
    info!(
        workers = num_workers,
        subject = %consumer.subject(),
        score_subject = %config.nats.score_subject,
        "Starting scoring loop"
    );

    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let service = service.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            handle_transaction(message, &service, &producer, &metrics).await;

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                    avg_latency_us = stats.mean_us,
                    "Processing milestone"
                );
            }

            drop(permit);
        });
    }

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Score one message and route the outcome
async fn handle_transaction(
    message: async_nats::Message,
    service: &ScoringService,
    producer: &ScoreProducer,
    metrics: &PipelineMetrics,
) {
    let start_time = Instant::now();
    let reply = message.reply.clone();

    let features: RawFeatures = match serde_json::from_slice(&message.payload) {
        Ok(features) => features,
        Err(e) => {
            warn!(error = %e, "Failed to deserialize feature mapping");
            metrics.record_rejected();
            let rejection = Rejection::new("invalid_json", vec![e.to_string()]);
            respond_rejection(producer, reply, &rejection).await;
            return;
        }
    };

    match service.score(&features) {
        Ok(result) => {
            let processing_time = start_time.elapsed();
            metrics.record_scored(processing_time, result.fraud_probability, result.is_fraud);

            let record = ScoredRecord::new(&result, features);
            if let Err(e) = producer.publish_record(&record).await {
                error!(record_id = %record.record_id, error = %e, "Failed to publish scored record");
            }
            if let Some(reply) = reply {
                if let Err(e) = producer.reply(reply, &result).await {
                    error!(error = %e, "Failed to reply with prediction");
                }
            }

            if result.is_fraud {
                info!(
                    record_id = %record.record_id,
                    fraud_probability = result.fraud_probability,
                    amount = result.transaction_amount,
                    processing_time_us = processing_time.as_micros(),
                    "Transaction flagged as fraud"
                );
            } else {
                debug!(
                    record_id = %record.record_id,
                    fraud_probability = result.fraud_probability,
                    processing_time_us = processing_time.as_micros(),
                    "Transaction scored"
                );
            }
        }
        Err(ScoringError::Validation(errors)) => {
            debug!(errors = %errors, "Transaction rejected by validation");
            metrics.record_rejected();
            let rejection = Rejection::new("validation_error", errors.into_messages());
            respond_rejection(producer, reply, &rejection).await;
        }
        Err(e) => {
            error!(error = %e, code = e.code(), "Scoring failed");
            metrics.record_failed();
            respond_rejection(producer, reply, &Rejection::internal()).await;
        }
    }
}

async fn respond_rejection(
    producer: &ScoreProducer,
    reply: Option<async_nats::Subject>,
    rejection: &Rejection,
) {
    if let Err(e) = producer.publish_rejection(rejection).await {
        error!(error = %e, "Failed to publish rejection");
    }
    if let Some(reply) = reply {
        if let Err(e) = producer.reply(reply, rejection).await {
            error!(error = %e, "Failed to reply with rejection");
        }
    }
}
