use super::metrics::PROCESSED_FILES;
use super::storage::ObjectAcl;
use super::transform::{Derivative, ImageTransformer};
use super::{MetadataStore, ServiceConnector, StorageService, WorkQueue};
use crate::config::{AckOrder, FailureMode, MAX_RECEIVE_BATCH, ServiceConfig, WaitPolicy};
use crate::error::{Dependency, ProcessingError, detail};
use crate::models::{
    BatchAbort, BatchOutcome, BatchResult, DerivativeInfo, ItemReport, ProcessedImage, Stage,
    WorkItem,
};
use crate::utils::hash::derivative_name;
use crate::utils::validation::sniff_content_type;
use std::sync::Arc;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Collaborators acquired for the duration of one batch.
struct BatchScope {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn StorageService>,
    metadata: Arc<dyn MetadataStore>,
}

/// Failure of one item, tagged with the last stage it completed.
type ItemFailure = (Stage, ProcessingError);

/// Drains one batch of resize requests per invocation.
pub struct ProcessingPipeline {
    connector: Arc<dyn ServiceConnector>,
    transformer: Arc<dyn ImageTransformer>,
    config: Arc<ServiceConfig>,
}

impl ProcessingPipeline {
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

    /// Receives up to `max_items` work items and processes them in receipt
    /// order.
    ///
    /// Only failures that happen before any item is attempted (connecting to
    /// or receiving from the queue) are returned as `Err`. Item failures are
    /// reported inside the [`BatchResult`]; in [`FailureMode::Abort`] the first
    /// one stops the batch and every later item is left untouched on the
    /// queue, to be redelivered once its visibility timeout lapses.
    pub async fn process_batch(
        &self,
        max_items: u32,
        wait: WaitPolicy,
    ) -> Result<BatchOutcome, ProcessingError> {
        let max_items = max_items.clamp(1, MAX_RECEIVE_BATCH);
        let wait_seconds = self.config.wait_seconds(wait);

        let queue = self
            .connector
            .work_queue()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::WorkQueue, e))?;
        let messages = queue
            .receive(max_items, wait_seconds)
            .await
            .map_err(|e| ProcessingError::Queue(detail(&e)))?;

        if messages.is_empty() {
            tracing::info!("No work items after waiting {}s", wait_seconds);
            return Ok(BatchOutcome::NothingToDo);
        }

        let items: Vec<WorkItem> = messages.into_iter().map(WorkItem::from).collect();
        let received = items.len();
        tracing::info!("📦 Received {} work item(s)", received);

        let mut reports = Vec::with_capacity(received);
        let mut aborted = None;

        match self.open_scope(queue).await {
            Ok(scope) => {
                let mut pending = items.iter().enumerate();
                for (index, item) in pending.by_ref() {
                    match self.process_item(&scope, item).await {
                        Ok((stage, derivative)) => {
                            tracing::info!(
                                "✅ [{}] {} -> {} ({}x{})",
                                index,
                                item.source_key,
                                derivative.name,
                                derivative.width,
                                derivative.height
                            );
                            reports.push(ItemReport::completed(
                                index,
                                &item.source_key,
                                stage,
                                derivative,
                            ));
                        }
                        Err((stage, err)) => {
                            tracing::error!(
                                "❌ [{}] {} failed after {:?}: {}",
                                index,
                                item.source_key,
                                stage,
                                err
                            );
                            reports.push(ItemReport::failed(index, &item.source_key, stage, &err));
                            if self.config.failure_mode == FailureMode::Abort {
                                aborted = Some(BatchAbort {
                                    index,
                                    kind: err.kind(),
                                    detail: err.to_string(),
                                });
                                break;
                            }
                        }
                    }
                }
                reports.extend(
                    pending.map(|(index, item)| ItemReport::untouched(index, &item.source_key)),
                );
            }
            Err(err) => {
                tracing::error!("Batch abandoned before the first item: {}", err);
                aborted = Some(BatchAbort {
                    index: 0,
                    kind: err.kind(),
                    detail: err.to_string(),
                });
                reports.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| ItemReport::untouched(index, &item.source_key)),
                );
            }
        }

        let metrics_error = self.count_processed(received).await;

        Ok(BatchOutcome::Processed(BatchResult {
            received,
            items: reports,
            aborted,
            metrics_error,
        }))
    }

    async fn open_scope(&self, queue: Arc<dyn WorkQueue>) -> Result<BatchScope, ProcessingError> {
        let store = self
            .connector
            .object_store()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::ObjectStore, e))?;
        let metadata = self
            .connector
            .metadata_store()
            .await
            .map_err(|e| ProcessingError::connect(Dependency::MetadataStore, e))?;
        Ok(BatchScope {
            queue,
            store,
            metadata,
        })
    }

    async fn process_item(
        &self,
        scope: &BatchScope,
        item: &WorkItem,
    ) -> Result<(Stage, DerivativeInfo), ItemFailure> {
        let key = &item.source_key;

        let object = scope
            .store
            .get_file(key)
            .await
            .map_err(|e| (Stage::Received, ProcessingError::Fetch(detail(&e))))?;

        let content_type = sniff_content_type(&object.data)
            .map(str::to_string)
            .or(object.content_type)
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        let derivative = self
            .transform(object.data)
            .await
            .map_err(|e| (Stage::Fetched, e))?;

        let name = derivative_name(key, &self.config.derivative_suffix);
        let processed = ProcessedImage {
            name: name.clone(),
            width: derivative.width,
            height: derivative.height,
        };

        scope
            .store
            .put_file(&name, derivative.data, &content_type, ObjectAcl::PublicRead)
            .await
            .map_err(|e| (Stage::Transformed, ProcessingError::Publish(detail(&e))))?;

        let stage = match self.config.ack_order {
            AckOrder::RecordThenAck => {
                Self::record(scope, key, &processed)
                    .await
                    .map_err(|e| (Stage::Published, e))?;
                Self::acknowledge(scope, item)
                    .await
                    .map_err(|e| (Stage::Recorded, e))?;
                Stage::Acknowledged
            }
            AckOrder::AckThenRecord => {
                Self::acknowledge(scope, item)
                    .await
                    .map_err(|e| (Stage::Published, e))?;
                Self::record(scope, key, &processed)
                    .await
                    .map_err(|e| (Stage::Acknowledged, e))?;
                Stage::Recorded
            }
        };

        Ok((
            stage,
            DerivativeInfo {
                name,
                width: processed.width,
                height: processed.height,
                content_type,
            },
        ))
    }

    async fn transform(&self, data: Vec<u8>) -> Result<Derivative, ProcessingError> {
        let transformer = self.transformer.clone();
        match tokio::task::spawn_blocking(move || transformer.resize(&data)).await {
            Ok(Ok(derivative)) => Ok(derivative),
            Ok(Err(e)) => Err(ProcessingError::Decode(detail(&e))),
            Err(e) => Err(ProcessingError::Decode(format!("resize aborted: {}", e))),
        }
    }

    async fn record(
        scope: &BatchScope,
        key: &str,
        processed: &ProcessedImage,
    ) -> Result<(), ProcessingError> {
        scope
            .metadata
            .put(key, &processed.attributes())
            .await
            .map_err(|e| ProcessingError::Record(detail(&e)))
    }

    async fn acknowledge(scope: &BatchScope, item: &WorkItem) -> Result<(), ProcessingError> {
        tracing::debug!("Deleting message {:?}", item.receipt_handle);
        scope
            .queue
            .delete(&item.receipt_handle)
            .await
            .map_err(|e| ProcessingError::Ack(detail(&e)))
    }

    /// Counts every received item, whether or not it completed.
    async fn count_processed(&self, received: usize) -> Option<String> {
        let result = match self.connector.metrics().await {
            Ok(sink) => sink
                .increment(PROCESSED_FILES, received as u64)
                .await
                .map_err(|e| ProcessingError::Metrics(detail(&e))),
            Err(e) => Err(ProcessingError::connect(Dependency::Metrics, e)),
        };

        result.err().map(|err| {
            tracing::warn!("Processed-files counter not emitted: {}", err);
            err.to_string()
        })
    }
}
