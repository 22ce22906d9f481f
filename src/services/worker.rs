use crate::config::WaitPolicy;
use crate::models::BatchOutcome;
use crate::services::pipeline::ProcessingPipeline;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Re-invokes the pipeline until shut down. Each iteration long-polls the
/// queue; when it comes back empty or fails, the worker idles before polling
/// again.
///
/// Shutdown is only observed between batches: a batch that has started runs
/// every item and its counter to completion.
pub struct BackgroundWorker {
    pipeline: Arc<ProcessingPipeline>,
    max_items: u32,
    idle: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        pipeline: Arc<ProcessingPipeline>,
        max_items: u32,
        idle: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            pipeline,
            max_items,
            idle,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Resize worker started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let outcome = self
                .pipeline
                .process_batch(self.max_items, WaitPolicy::LongPoll)
                .await;
            let busy = Self::report(outcome);

            if *self.shutdown.borrow() {
                break;
            }

            if !busy {
                tokio::select! {
                    _ = self.shutdown.changed() => break,
                    _ = sleep(self.idle) => {}
                }
            }
        }

        tracing::info!("🛑 Resize worker shutting down");
    }

    /// Returns true when the batch had work in it and no early failure.
    fn report(outcome: Result<BatchOutcome, crate::error::ProcessingError>) -> bool {
        match outcome {
            Ok(BatchOutcome::NothingToDo) => false,
            Ok(BatchOutcome::Processed(result)) => {
                tracing::info!(
                    "Batch done: received={}, completed={}, failed={}, untouched={}",
                    result.received,
                    result.completed(),
                    result.failed(),
                    result.untouched()
                );
                if let Some(err) = &result.metrics_error {
                    tracing::warn!("Batch counter not emitted: {}", err);
                }
                result.aborted.is_none()
            }
            Err(e) => {
                tracing::error!("Failed to receive work items: {}", e);
                false
            }
        }
    }
}
