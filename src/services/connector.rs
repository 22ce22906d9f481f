use super::{MetadataStore, MetricsSink, Notifier, StorageService, WorkQueue};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Hands out collaborator connections for one operation.
///
/// Every submission and every batch acquires what it needs through the
/// connector when it starts, and drops it when it ends. Nothing is cached
/// between invocations.
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    async fn object_store(&self) -> Result<Arc<dyn StorageService>>;
    async fn work_queue(&self) -> Result<Arc<dyn WorkQueue>>;
    async fn metadata_store(&self) -> Result<Arc<dyn MetadataStore>>;
    async fn metrics(&self) -> Result<Arc<dyn MetricsSink>>;
    async fn notifier(&self) -> Result<Arc<dyn Notifier>>;
}
