use super::metrics::UPLOADED_FILES;
use super::storage::ObjectAcl;
use super::transform::{ImageInfo, ImageTransformer};
use super::ServiceConnector;
use crate::config::ServiceConfig;
use crate::error::{Dependency, ProcessingError, detail};
use crate::models::{ImageRecord, NotificationStatus, SubmissionReceipt, SubmissionResult};
use crate::utils::hash::storage_key;
use crate::utils::validation::sanitize_original_name;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub original_name: String,
    /// Content type claimed by the client; only used for diagnostics.
    pub declared_content_type: Option<String>,
    pub client_address: String,
}

pub struct SubmissionService {
    connector: Arc<dyn ServiceConnector>,
    transformer: Arc<dyn ImageTransformer>,
    config: Arc<ServiceConfig>,
}

impl SubmissionService {
    pub fn new(
        connector: Arc<dyn ServiceConnector>,
        transformer: Arc<dyn ImageTransformer>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            connector,
            transformer,
            config,
        }
    }

    /// Validates the upload, stores the original, writes its record, queues
    /// the resize request and counts the upload.
    ///
    /// Steps are not rolled back: a failure after the original was stored
    /// leaves the object in place without a record or queued request.
    pub async fn submit(&self, upload: Upload) -> Result<SubmissionResult, ProcessingError> {
        let info = match self.inspect(upload.bytes.clone()).await {
            Ok(info) => info,
            Err(reason) => {
                tracing::warn!(
                    "Rejected upload '{}' from {}: {}",
                    upload.original_name,
                    upload.client_address,
                    reason
                );
                let notification = self.notify_invalid(&upload).await;
                return Ok(SubmissionResult::InvalidImage {
                    reason,
                    notification,
                });
            }
        };

        let now = Utc::now();
        let name = sanitize_original_name(&upload.original_name);
        let key = storage_key(&now, &name, info.extension);
        tracing::info!(
            "Accepted {}x{} {} upload '{}' as {}",
            info.width,
            info.height,
            info.content_type,
            name,
            key
        );

        let store = self
            .connector
            .object_store()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::ObjectStore, e))?;
        store
            .put_file(&key, upload.bytes.to_vec(), info.content_type, ObjectAcl::PublicRead)
            .await
            .map_err(|e| ProcessingError::Publish(detail(&e)))?;

        let record = ImageRecord::new_upload(key.clone(), now, info.width, info.height);
        let metadata = self
            .connector
            .metadata_store()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::MetadataStore, e))?;
        metadata
            .put(&key, &record.to_attributes())
            .await
            .map_err(|e| ProcessingError::Record(detail(&e)))?;

        let queue = self
            .connector
            .work_queue()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::WorkQueue, e))?;
        queue
            .send(&key)
            .await
            .map_err(|e| ProcessingError::Queue(detail(&e)))?;

        let metrics = self
            .connector
            .metrics()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::Metrics, e))?;
        metrics
            .increment(UPLOADED_FILES, 1)
            .await
            .map_err(|e| ProcessingError::Metrics(detail(&e)))?;

        Ok(SubmissionResult::Accepted(SubmissionReceipt {
            source_key: key,
            content_type: info.content_type.to_string(),
            width: info.width,
            height: info.height,
            uploaded_date: record.uploaded_date,
        }))
    }

    async fn inspect(&self, bytes: Bytes) -> Result<ImageInfo, String> {
        let transformer = self.transformer.clone();
        match tokio::task::spawn_blocking(move || transformer.inspect(&bytes)).await {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(e)) => Err(detail(&e)),
            Err(e) => Err(format!("image inspection aborted: {}", e)),
        }
    }

    async fn notify_invalid(&self, upload: &Upload) -> NotificationStatus {
        let message = format!(
            "Upload failed attempt from {} - {}",
            upload.client_address,
            upload.declared_content_type.as_deref().unwrap_or("unknown")
        );

        let result = match self.connector.notifier().await {
            Ok(notifier) => notifier
                .publish(&self.config.notify_topic, &message)
                .await
                .map_err(|e| ProcessingError::Notification(detail(&e))),
            Err(e) => Err(ProcessingError::connect(Dependency::Notifications, e)),
        };

        match result {
            Ok(()) => NotificationStatus::Sent,
            Err(err) => {
                tracing::error!("Failed to notify operators: {}", err);
                NotificationStatus::Failed {
                    detail: err.to_string(),
                }
            }
        }
    }
}
