use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

/// External collaborators the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    ObjectStore,
    WorkQueue,
    MetadataStore,
    Metrics,
    Notifications,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dependency::ObjectStore => "object store",
            Dependency::WorkQueue => "work queue",
            Dependency::MetadataStore => "metadata store",
            Dependency::Metrics => "metrics sink",
            Dependency::Notifications => "notification channel",
        };
        f.write_str(name)
    }
}

/// Discriminant of [`ProcessingError`], used in reports and HTTP bodies.
/// `InvalidImage` is reported by submission, which never fails with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    InvalidImage,
    ConnectError,
    FetchError,
    DecodeError,
    PublishError,
    AckError,
    RecordError,
    QueryError,
    NotificationError,
    QueueError,
    MetricsError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Unable to connect to {dependency}: {detail}")]
    Connect {
        dependency: Dependency,
        detail: String,
    },

    #[error("Unable to download image from object store: {0}")]
    Fetch(String),

    #[error("Unable to read stored file as an image: {0}")]
    Decode(String),

    #[error("Unable to upload image to object store: {0}")]
    Publish(String),

    #[error("Unable to delete message from queue: {0}")]
    Ack(String),

    #[error("Unable to write image record: {0}")]
    Record(String),

    #[error("Unable to query image records: {0}")]
    Query(String),

    #[error("Unable to send notification: {0}")]
    Notification(String),

    #[error("Work queue request failed: {0}")]
    Queue(String),

    #[error("Unable to emit metric: {0}")]
    Metrics(String),
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessingError::Connect { .. } => ErrorKind::ConnectError,
            ProcessingError::Fetch(_) => ErrorKind::FetchError,
            ProcessingError::Decode(_) => ErrorKind::DecodeError,
            ProcessingError::Publish(_) => ErrorKind::PublishError,
            ProcessingError::Ack(_) => ErrorKind::AckError,
            ProcessingError::Record(_) => ErrorKind::RecordError,
            ProcessingError::Query(_) => ErrorKind::QueryError,
            ProcessingError::Notification(_) => ErrorKind::NotificationError,
            ProcessingError::Queue(_) => ErrorKind::QueueError,
            ProcessingError::Metrics(_) => ErrorKind::MetricsError,
        }
    }

    pub fn connect(dependency: Dependency, err: anyhow::Error) -> Self {
        ProcessingError::Connect {
            dependency,
            detail: format!("{:#}", err),
        }
    }

    /// True when the failure came from a collaborator rather than the input.
    pub fn is_dependency_failure(&self) -> bool {
        !matches!(self, ProcessingError::Decode(_))
    }
}

/// Flattens an `anyhow` chain into the detail string carried by errors.
pub(crate) fn detail(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
