use super::aws;
use crate::config::ServiceConfig;
use crate::services::metadata::SeaOrmMetadataStore;
use crate::services::metrics::TracingMetricsSink;
use crate::services::notifier::create_notifier;
use crate::services::queue::SqsWorkQueue;
use crate::services::storage::S3StorageService;
use crate::services::{
    MetadataStore, MetricsSink, Notifier, ServiceConnector, StorageService, WorkQueue,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Builds fresh AWS and database backed collaborators on every request.
///
/// The SDK clients and the connection pool are shared handles; what is
/// created per call is the adapter around them, so each invocation resolves
/// the queue and checks the database on its own.
pub struct AwsConnector {
    s3: aws_sdk_s3::Client,
    sqs: aws_sdk_sqs::Client,
    db: DatabaseConnection,
    config: Arc<ServiceConfig>,
}

impl AwsConnector {
    pub async fn from_config(config: Arc<ServiceConfig>, db: DatabaseConnection) -> Self {
        let sdk = aws::load_sdk_config(&config).await;
        Self {
            s3: aws::s3_client(&sdk, &config),
            sqs: aws::sqs_client(&sdk, &config),
            db,
            config,
        }
    }
}

#[async_trait]
impl ServiceConnector for AwsConnector {
    async fn object_store(&self) -> Result<Arc<dyn StorageService>> {
        Ok(Arc::new(S3StorageService::new(
            self.s3.clone(),
            self.config.bucket.clone(),
        )))
    }

    async fn work_queue(&self) -> Result<Arc<dyn WorkQueue>> {
        let queue = match &self.config.queue_url {
            Some(url) => SqsWorkQueue::new(self.sqs.clone(), url.clone()),
            None => SqsWorkQueue::resolve(self.sqs.clone(), &self.config.queue_name).await?,
        };
        tracing::debug!("Using queue {}", queue.queue_url());
        Ok(Arc::new(queue))
    }

    async fn metadata_store(&self) -> Result<Arc<dyn MetadataStore>> {
        self.db.ping().await.context("metadata database unreachable")?;
        Ok(Arc::new(SeaOrmMetadataStore::new(
            self.db.clone(),
            self.config.metadata_domain.clone(),
        )))
    }

    async fn metrics(&self) -> Result<Arc<dyn MetricsSink>> {
        Ok(Arc::new(TracingMetricsSink::new(
            self.config.metrics_namespace.clone(),
        )))
    }

    async fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        Ok(Arc::from(create_notifier(&self.config)?))
    }
}
