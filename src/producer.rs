//! NATS publisher for scored records, rejections and replies

use crate::types::prediction::{Rejection, ScoredRecord};
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes scoring outcomes for the persistence layer and reply subjects
#[derive(Clone)]
pub struct ScoreProducer {
    client: Client,
    score_subject: String,
    rejection_subject: String,
}

impl ScoreProducer {
    pub fn new(client: Client, score_subject: &str, rejection_subject: &str) -> Self {
        Self {
            client,
            score_subject: score_subject.to_string(),
            rejection_subject: rejection_subject.to_string(),
        }
    }

    /// Publish a scored record for persistence
    pub async fn publish_record(&self, record: &ScoredRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        self.client
            .publish(self.score_subject.clone(), payload.into())
            .await?;

        debug!(
            record_id = %record.record_id,
            fraud_probability = record.fraud_probability,
            "Published scored record"
        );
        Ok(())
    }

    /// Publish a rejected request
    pub async fn publish_rejection(&self, rejection: &Rejection) -> Result<()> {
        let payload = serde_json::to_vec(rejection)?;
        self.client
            .publish(self.rejection_subject.clone(), payload.into())
            .await?;

        debug!(code = %rejection.code, "Published rejection");
        Ok(())
    }

    /// Reply to a request/reply caller
    pub async fn reply<T: Serialize>(&self, reply: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        self.client.publish(reply, payload.into()).await?;
        Ok(())
    }
}
