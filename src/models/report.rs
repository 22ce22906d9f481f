use crate::error::{ErrorKind, ProcessingError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Per-item pipeline stages, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Fetched,
    Transformed,
    Published,
    Recorded,
    Acknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Failed,
    /// Never attempted because the batch stopped earlier.
    Untouched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DerivativeInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl From<&ProcessingError> for ItemError {
    fn from(err: &ProcessingError) -> Self {
        Self {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

/// Terminal state of one received work item.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ItemReport {
    pub index: usize,
    pub source_key: String,
    /// Last stage the item reached.
    pub stage: Stage,
    pub status: ItemStatus,
    pub derivative: Option<DerivativeInfo>,
    pub error: Option<ItemError>,
}

impl ItemReport {
    pub fn completed(index: usize, source_key: &str, stage: Stage, derivative: DerivativeInfo) -> Self {
        Self {
            index,
            source_key: source_key.to_string(),
            stage,
            status: ItemStatus::Completed,
            derivative: Some(derivative),
            error: None,
        }
    }

    pub fn failed(index: usize, source_key: &str, stage: Stage, err: &ProcessingError) -> Self {
        Self {
            index,
            source_key: source_key.to_string(),
            stage,
            status: ItemStatus::Failed,
            derivative: None,
            error: Some(err.into()),
        }
    }

    pub fn untouched(index: usize, source_key: &str) -> Self {
        Self {
            index,
            source_key: source_key.to_string(),
            stage: Stage::Received,
            status: ItemStatus::Untouched,
            derivative: None,
            error: None,
        }
    }
}

/// Where and why a batch stopped early.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BatchAbort {
    pub index: usize,
    pub kind: ErrorKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BatchResult {
    /// Number of work items handed out by the queue.
    pub received: usize,
    pub items: Vec<ItemReport>,
    pub aborted: Option<BatchAbort>,
    /// Set when the processed-files counter could not be emitted.
    pub metrics_error: Option<String>,
}

impl BatchResult {
    pub fn completed(&self) -> usize {
        self.count(ItemStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn untouched(&self) -> usize {
        self.count(ItemStatus::Untouched)
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The queue had nothing to hand out; informational, not an error.
    NothingToDo,
    Processed(BatchResult),
}

/// Accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SubmissionReceipt {
    pub source_key: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub uploaded_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed { detail: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionResult {
    Accepted(SubmissionReceipt),
    /// The upload was not an image; the operator channel was notified.
    InvalidImage {
        reason: String,
        notification: NotificationStatus,
    },
}
