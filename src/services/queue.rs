use crate::models::{ReceiptHandle, ReceivedMessage};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_sqs::Client;

/// At-least-once work queue with visibility timeouts.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Receive up to `max_items` messages, blocking up to `wait_seconds`
    /// when none are immediately available.
    async fn receive(&self, max_items: u32, wait_seconds: u32) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge a received message.
    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<()>;

    async fn send(&self, payload: &str) -> Result<()>;
}

pub struct SqsWorkQueue {
    client: Client,
    queue_url: String,
}

impl SqsWorkQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Looks the queue URL up by name.
    pub async fn resolve(client: Client, queue_name: &str) -> Result<Self> {
        let res = client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .with_context(|| format!("get_queue_url {}", queue_name))?;

        let queue_url = res
            .queue_url()
            .ok_or_else(|| anyhow!("No URL returned for queue '{}'", queue_name))?
            .to_string();

        Ok(Self::new(client, queue_url))
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl WorkQueue for SqsWorkQueue {
    async fn receive(&self, max_items: u32, wait_seconds: u32) -> Result<Vec<ReceivedMessage>> {
        let res = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_items as i32)
            .wait_time_seconds(wait_seconds as i32)
            .send()
            .await
            .context("receive_message")?;

        let mut received = Vec::new();
        for message in res.messages.unwrap_or_default() {
            match (message.body, message.receipt_handle) {
                (Some(body), Some(handle)) => received.push(ReceivedMessage {
                    body,
                    receipt_handle: ReceiptHandle::new(handle),
                }),
                (_, handle) => tracing::warn!(
                    "Skipping malformed SQS message {:?} (has handle: {})",
                    message.message_id,
                    handle.is_some()
                ),
            }
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .context("delete_message")?;
        Ok(())
    }

    async fn send(&self, payload: &str) -> Result<()> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(payload)
            .send()
            .await
            .context("send_message")?;
        Ok(())
    }
}
