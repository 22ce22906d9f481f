pub mod record;
pub mod report;

pub use record::{
    Attributes, ImageRecord, OrderBy, ProcessedImage, RecordDecodeError, RecordFilter,
    RecordQuery,
};
pub use report::{
    BatchAbort, BatchOutcome, BatchResult, DerivativeInfo, ItemError, ItemReport, ItemStatus,
    NotificationStatus, Stage, SubmissionReceipt, SubmissionResult,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of a receipt handle shown in logs.
const HANDLE_PREVIEW_LEN: usize = 80;

/// Opaque proof-of-receipt returned by the queue; needed to delete a message.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn abbreviated(&self) -> &str {
        match self.0.char_indices().nth(HANDLE_PREVIEW_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Debug for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReceiptHandle({}...)", self.abbreviated())
    }
}

/// A message as handed out by the work queue.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: ReceiptHandle,
}

/// One pending resize job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Object store key of the original; also the image record key.
    pub source_key: String,
    pub receipt_handle: ReceiptHandle,
}

impl From<ReceivedMessage> for WorkItem {
    fn from(message: ReceivedMessage) -> Self {
        Self {
            source_key: message.body.trim().to_string(),
            receipt_handle: message.receipt_handle,
        }
    }
}
