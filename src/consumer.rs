//! NATS subscriptions feeding the scoring service

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to incoming feature mappings and model-info requests
pub struct TransactionConsumer {
    client: Client,
    subject: String,
    model_info_subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str, model_info_subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            model_info_subject: model_info_subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Subscribe to model-info requests
    pub async fn subscribe_model_info(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .subscribe(self.model_info_subject.clone())
            .await?;
        info!(subject = %self.model_info_subject, "Subscribed to model info subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
