pub mod api;
pub mod config;
pub mod entities;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::api::middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use crate::config::ServiceConfig;
use crate::services::ServiceConnector;
use crate::services::catalog::ImageCatalog;
use crate::services::pipeline::ProcessingPipeline;
use crate::services::submission::SubmissionService;
use crate::services::transform::ImageTransformer;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::images::upload_image,
        handlers::images::list_images,
        handlers::process::process_batch,
        handlers::health::health_check,
    ),
    components(
        schemas(
            handlers::images::UploadResponse,
            handlers::images::InvalidImageResponse,
            handlers::images::ListResponse,
            handlers::process::ProcessResponse,
            handlers::health::HealthResponse,
            services::catalog::CatalogEntry,
            services::catalog::PublishedImage,
            models::BatchResult,
            models::BatchAbort,
            models::ItemReport,
            models::ItemError,
            models::ItemStatus,
            models::Stage,
            models::DerivativeInfo,
            models::NotificationStatus,
            error::ErrorKind,
            error::Dependency,
            config::FailureMode,
            config::AckOrder,
        )
    ),
    tags(
        (name = "images", description = "Upload and listing"),
        (name = "processing", description = "Resize queue draining"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionService>,
    pub pipeline: Arc<ProcessingPipeline>,
    pub catalog: Arc<ImageCatalog>,
    pub connector: Arc<dyn ServiceConnector>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(
        connector: Arc<dyn ServiceConnector>,
        transformer: Arc<dyn ImageTransformer>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            submission: Arc::new(SubmissionService::new(
                connector.clone(),
                transformer.clone(),
                config.clone(),
            )),
            pipeline: Arc::new(ProcessingPipeline::new(
                connector.clone(),
                transformer,
                config.clone(),
            )),
            catalog: Arc::new(ImageCatalog::new(connector.clone(), config.clone())),
            connector,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size + MULTIPART_OVERHEAD;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health_check))
        .route("/upload", post(handlers::images::upload_image))
        .route("/process", post(handlers::process::process_batch))
        .route("/images", get(handlers::images::list_images))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
