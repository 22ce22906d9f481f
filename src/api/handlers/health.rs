use crate::AppState;
use crate::config::{AckOrder, FailureMode};
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub metadata_store: String,
    pub version: String,
    pub bucket: String,
    pub queue: String,
    pub metadata_domain: String,
    pub failure_mode: FailureMode,
    pub ack_order: AckOrder,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service status and effective configuration", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let metadata_status = match state.connector.metadata_store().await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("Health check: metadata store unavailable: {:#}", e);
            "disconnected"
        }
    };

    let config = &state.config;
    Json(HealthResponse {
        status: "ok".to_string(),
        metadata_store: metadata_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bucket: config.bucket.clone(),
        queue: config
            .queue_url
            .clone()
            .unwrap_or_else(|| config.queue_name.clone()),
        metadata_domain: config.metadata_domain.clone(),
        failure_mode: config.failure_mode,
        ack_order: config.ack_order,
    })
}
