use anyhow::Result;
use async_trait::async_trait;

/// Incremented once per accepted upload.
pub const UPLOADED_FILES: &str = "UploadedFiles";
/// Incremented by the number of messages received in a batch.
pub const PROCESSED_FILES: &str = "ProcessedFiles";

#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn increment(&self, name: &str, amount: u64) -> Result<()>;
}

/// Emits counters as structured events on the `metrics` target, where the
/// log pipeline picks them up alongside the request metrics.
pub struct TracingMetricsSink {
    namespace: String,
}

impl TracingMetricsSink {
    pub fn new(namespace: String) -> Self {
        Self { namespace }
    }
}

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn increment(&self, name: &str, amount: u64) -> Result<()> {
        tracing::info!(
            target: "metrics",
            namespace = %self.namespace,
            metric = %name,
            value = amount,
            unit = "Count",
            "counter_incremented"
        );
        Ok(())
    }
}
