pub mod catalog;
pub mod connector;
pub mod metadata;
pub mod metrics;
pub mod notifier;
pub mod pipeline;
pub mod queue;
pub mod storage;
pub mod submission;
pub mod transform;
pub mod worker;

pub use connector::ServiceConnector;
pub use metadata::MetadataStore;
pub use metrics::MetricsSink;
pub use notifier::Notifier;
pub use queue::WorkQueue;
pub use storage::StorageService;
