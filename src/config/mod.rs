use serde::Serialize;
use std::env;
use std::str::FromStr;
use utoipa::ToSchema;

/// What happens to the rest of a batch when one item fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Stop at the first failing item; later items stay queued
    Abort,
    /// Record the failure and move on to the next item
    Isolate,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(FailureMode::Abort),
            "isolate" => Ok(FailureMode::Isolate),
            other => Err(format!("unknown failure mode '{}'", other)),
        }
    }
}

/// Order of the last two per-item steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AckOrder {
    /// Finalize the image record, then delete the queue message
    RecordThenAck,
    /// Delete the queue message, then finalize the image record
    AckThenRecord,
}

impl FromStr for AckOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "record_then_ack" | "record-then-ack" => Ok(AckOrder::RecordThenAck),
            "ack_then_record" | "ack-then-record" => Ok(AckOrder::AckThenRecord),
            other => Err(format!("unknown ack order '{}'", other)),
        }
    }
}

/// How long a receive call may block waiting for work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Interactive callers that want an answer quickly
    Immediate,
    /// Background callers; long poll to avoid empty receives
    LongPoll,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum accepted upload in bytes (default: 10 MB)
    pub max_upload_size: usize,

    /// Bucket holding originals and derivatives
    pub bucket: String,

    /// S3-compatible endpoint override (MinIO, LocalStack)
    pub s3_endpoint: Option<String>,

    /// SQS-compatible endpoint override (ElasticMQ, LocalStack)
    pub sqs_endpoint: Option<String>,

    /// AWS region (default: "eu-west-1")
    pub region: String,

    /// Static credentials; the default provider chain is used when unset
    pub access_key: Option<String>,
    pub secret_key: Option<String>,

    /// Queue name, resolved to a URL when `queue_url` is unset
    pub queue_name: String,
    pub queue_url: Option<String>,

    /// Metadata domain the image records live in
    pub metadata_domain: String,

    /// Database backing the metadata store
    pub database_url: String,

    /// Namespace for emitted counters (default: "Resize")
    pub metrics_namespace: String,

    /// Notifier type: "webhook" or "noop" (default: "noop")
    pub notifier_type: String,

    /// Webhook receiving operator notifications
    pub notify_endpoint: Option<String>,

    /// Topic operator notifications are published to
    pub notify_topic: String,

    /// Work items requested per receive, 1..=10 (default: 10)
    pub max_batch_size: u32,

    /// Receive wait for background invocations (default: 20 s)
    pub long_poll_seconds: u32,

    /// Receive wait for interactive invocations (default: 2 s)
    pub short_poll_seconds: u32,

    /// Bounding box for derivatives (default: 200 x 200)
    pub thumb_max_width: u32,
    pub thumb_max_height: u32,

    /// JPEG encoder quality for derivatives (default: 85)
    pub jpeg_quality: u8,

    /// Suffix inserted before the extension of derivative names
    pub derivative_suffix: String,

    pub failure_mode: FailureMode,

    pub ack_order: AckOrder,

    /// Pause between worker polls after an empty or failed batch (default: 5 s)
    pub worker_idle_seconds: u64,

    /// Base URL objects are publicly served from
    pub public_base_url: String,
}

/// Largest batch a single receive may return
pub const MAX_RECEIVE_BATCH: u32 = 10;

impl Default for ServiceConfig {
    fn default() -> Self {
        let bucket = "resize-images".to_string();
        Self {
            max_upload_size: 10 * 1024 * 1024, // 10 MB
            public_base_url: default_public_base_url(&bucket),
            bucket,
            s3_endpoint: None,
            sqs_endpoint: None,
            region: "eu-west-1".to_string(),
            access_key: None,
            secret_key: None,
            queue_name: "resize-requests".to_string(),
            queue_url: None,
            metadata_domain: "resize-images".to_string(),
            database_url: "sqlite://resize.db?mode=rwc".to_string(),
            metrics_namespace: "Resize".to_string(),
            notifier_type: "noop".to_string(),
            notify_endpoint: None,
            notify_topic: "resize-upload-failures".to_string(),
            max_batch_size: MAX_RECEIVE_BATCH,
            long_poll_seconds: 20,
            short_poll_seconds: 2,
            thumb_max_width: 200,
            thumb_max_height: 200,
            jpeg_quality: 85,
            derivative_suffix: "_thumb".to_string(),
            failure_mode: FailureMode::Abort,
            ack_order: AckOrder::RecordThenAck,
            worker_idle_seconds: 5,
        }
    }
}

fn default_public_base_url(bucket: &str) -> String {
    format!("https://{}.s3.amazonaws.com/", bucket)
}

fn parsed<T: FromStr>(name: &str, fallback: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let bucket = env::var("S3_BUCKET").unwrap_or(default.bucket);

        Self {
            max_upload_size: parsed("MAX_UPLOAD_SIZE", default.max_upload_size),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| default_public_base_url(&bucket)),
            bucket,
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            sqs_endpoint: env::var("SQS_ENDPOINT").ok(),
            region: env::var("AWS_REGION").unwrap_or(default.region),
            access_key: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            queue_name: env::var("SQS_QUEUE_NAME").unwrap_or(default.queue_name),
            queue_url: env::var("SQS_QUEUE_URL").ok(),
            metadata_domain: env::var("METADATA_DOMAIN").unwrap_or(default.metadata_domain),
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),
            metrics_namespace: env::var("METRICS_NAMESPACE").unwrap_or(default.metrics_namespace),
            notifier_type: env::var("NOTIFIER_TYPE").unwrap_or(default.notifier_type),
            notify_endpoint: env::var("NOTIFY_ENDPOINT").ok(),
            notify_topic: env::var("NOTIFY_TOPIC").unwrap_or(default.notify_topic),
            max_batch_size: parsed("MAX_BATCH_SIZE", default.max_batch_size)
                .clamp(1, MAX_RECEIVE_BATCH),
            long_poll_seconds: parsed("LONG_POLL_SECONDS", default.long_poll_seconds),
            short_poll_seconds: parsed("SHORT_POLL_SECONDS", default.short_poll_seconds),
            thumb_max_width: parsed("THUMB_MAX_WIDTH", default.thumb_max_width).max(1),
            thumb_max_height: parsed("THUMB_MAX_HEIGHT", default.thumb_max_height).max(1),
            jpeg_quality: parsed("JPEG_QUALITY", default.jpeg_quality).clamp(1, 100),
            derivative_suffix: env::var("DERIVATIVE_SUFFIX").unwrap_or(default.derivative_suffix),
            failure_mode: parsed("BATCH_FAILURE_MODE", default.failure_mode),
            ack_order: parsed("ACK_ORDER", default.ack_order),
            worker_idle_seconds: parsed("WORKER_IDLE_SECONDS", default.worker_idle_seconds),
        }
    }

    /// Create config for local development (MinIO + ElasticMQ + SQLite)
    pub fn development() -> Self {
        let bucket = "resize-dev".to_string();
        Self {
            public_base_url: format!("http://127.0.0.1:9000/{}/", bucket),
            bucket,
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            sqs_endpoint: Some("http://127.0.0.1:9324".to_string()),
            region: "us-east-1".to_string(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            database_url: "sqlite::memory:".to_string(),
            long_poll_seconds: 5,
            short_poll_seconds: 1,
            worker_idle_seconds: 1,
            ..Self::default()
        }
    }

    pub fn wait_seconds(&self, policy: WaitPolicy) -> u32 {
        match policy {
            WaitPolicy::Immediate => self.short_poll_seconds,
            WaitPolicy::LongPoll => self.long_poll_seconds,
        }
    }

    /// Public URL of an object key
    pub fn public_url(&self, key: &str) -> String {
        if self.public_base_url.ends_with('/') {
            format!("{}{}", self.public_base_url, key)
        } else {
            format!("{}/{}", self.public_base_url, key)
        }
    }
}
