use crate::AppState;
use crate::api::AppError;
use crate::error::ErrorKind;
use crate::models::{NotificationStatus, SubmissionResult};
use crate::services::catalog::{CatalogEntry, parse_limit};
use crate::services::submission::Upload;
use crate::utils::validation::{UNNAMED_UPLOAD, validate_upload_size};
use axum::{
    Json,
    extract::{ConnectInfo, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::{IntoParams, ToSchema};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub source_key: String,
    pub url: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub uploaded_date: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct InvalidImageResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub notification: NotificationStatus,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 1 to 250, defaults to 50
    pub limit: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ListResponse {
    pub images: Vec<CatalogEntry>,
}

fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Image in the `image` field"),
    responses(
        (status = 201, description = "Image stored and queued for resizing", body = UploadResponse),
        (status = 400, description = "Missing image field"),
        (status = 413, description = "Upload exceeds the size limit"),
        (status = 422, description = "Upload is not a supported image", body = InvalidImageResponse),
        (status = 502, description = "A backing service failed")
    ),
    tag = "images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload: Option<(Bytes, String, Option<String>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some((data, original_name, content_type));
        break;
    }

    let (bytes, original_name, declared_content_type) = upload
        .ok_or_else(|| AppError::BadRequest(format!("Missing '{}' field", IMAGE_FIELD)))?;

    validate_upload_size(bytes.len(), state.config.max_upload_size)
        .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;

    let result = state
        .submission
        .submit(Upload {
            bytes,
            original_name,
            declared_content_type,
            client_address: client_address(&headers, peer.map(|ConnectInfo(addr)| addr)),
        })
        .await?;

    match result {
        SubmissionResult::Accepted(receipt) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: state.config.public_url(&receipt.source_key),
                source_key: receipt.source_key,
                content_type: receipt.content_type,
                width: receipt.width,
                height: receipt.height,
                uploaded_date: receipt.uploaded_date,
            }),
        )
            .into_response()),
        SubmissionResult::InvalidImage {
            reason,
            notification,
        } => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(InvalidImageResponse {
                error: reason,
                kind: ErrorKind::InvalidImage,
                notification,
            }),
        )
            .into_response()),
    }
}

#[utoipa::path(
    get,
    path = "/images",
    params(ListQuery),
    responses(
        (status = 200, description = "Processed images, newest first", body = ListResponse),
        (status = 502, description = "Metadata store failed")
    ),
    tag = "images"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, AppError> {
    let images = state
        .catalog
        .list_processed(parse_limit(query.limit.as_deref()))
        .await?;
    Ok(Json(ListResponse { images }))
}
