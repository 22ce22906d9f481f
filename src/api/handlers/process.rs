use crate::AppState;
use crate::api::AppError;
use crate::config::WaitPolicy;
use crate::models::{BatchOutcome, BatchResult};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProcessQuery {
    /// Use the short queue wait instead of long polling. Present without a
    /// value counts as set.
    pub immediately: Option<String>,
}

impl ProcessQuery {
    pub fn wait_policy(&self) -> WaitPolicy {
        match self.immediately.as_deref().map(str::trim) {
            None | Some("false") | Some("0") => WaitPolicy::LongPoll,
            Some(_) => WaitPolicy::Immediate,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProcessResponse {
    pub message: String,
    pub nothing_to_do: bool,
    pub batch: Option<BatchResult>,
}

impl From<BatchOutcome> for ProcessResponse {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::NothingToDo => Self {
                message: "Nothing to process".to_string(),
                nothing_to_do: true,
                batch: None,
            },
            BatchOutcome::Processed(batch) => {
                let mut message = format!(
                    "Received {} item(s): {} completed, {} failed, {} untouched",
                    batch.received,
                    batch.completed(),
                    batch.failed(),
                    batch.untouched()
                );
                if let Some(abort) = &batch.aborted {
                    message.push_str(&format!(
                        "; stopped at item {} ({:?}: {})",
                        abort.index, abort.kind, abort.detail
                    ));
                }
                Self {
                    message,
                    nothing_to_do: false,
                    batch: Some(batch),
                }
            }
        }
    }
}

#[utoipa::path(
    post,
    path = "/process",
    params(ProcessQuery),
    responses(
        (status = 200, description = "One batch was drained", body = ProcessResponse),
        (status = 502, description = "The work queue could not be read")
    ),
    tag = "processing"
)]
pub async fn process_batch(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<ProcessResponse>, AppError> {
    let outcome = state
        .pipeline
        .process_batch(state.config.max_batch_size, query.wait_policy())
        .await?;
    Ok(Json(outcome.into()))
}
