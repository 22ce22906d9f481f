use crate::config::ServiceConfig;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;

/// Publishes short text messages to a named topic.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    topic: &'a str,
    message: &'a str,
}

/// Posts `{"topic", "message"}` as JSON to an HTTP endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&WebhookPayload { topic, message })
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Notification endpoint {} answered {}",
                self.endpoint,
                res.status()
            ));
        }
        Ok(())
    }
}

/// Logs the message instead of sending it (development mode).
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        tracing::warn!("NoOpNotifier: not publishing to '{}': {}", topic, message);
        Ok(())
    }
}

/// Builds the notifier selected by `NOTIFIER_TYPE`.
pub fn create_notifier(config: &ServiceConfig) -> Result<Box<dyn Notifier>> {
    match config.notifier_type.to_lowercase().as_str() {
        "webhook" => {
            let endpoint = config
                .notify_endpoint
                .clone()
                .ok_or_else(|| anyhow!("NOTIFY_ENDPOINT is required for the webhook notifier"))?;
            Ok(Box::new(WebhookNotifier::new(endpoint)))
        }
        "noop" | "none" | "disabled" => Ok(Box::new(NoOpNotifier)),
        other => {
            tracing::warn!("Unknown notifier type '{}', using NoOpNotifier", other);
            Ok(Box::new(NoOpNotifier))
        }
    }
}
