//! Handlers for uploads and file operations.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::handlers::extract::{CurrentUser, MaybeUser, ShareQuery};
use crate::services::AppState;
use crate::services::files_service::FileResponse;
use crate::services::uploads_service::{
    CancelUploadRequest, CompleteUploadRequest, InitiateUploadRequest, InitiateUploadResponse,
    UploadCompletedResponse,
};

/// POST `/files/upload` — initiate a multipart upload.
pub async fn initiate_upload(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(data): Json<InitiateUploadRequest>,
) -> ApiResult<Json<InitiateUploadResponse>> {
    Ok(Json(state.uploads().initiate(user_id, data).await?))
}

/// POST `/files/{id}/complete-upload` — finalize a multipart upload.
pub async fn complete_upload(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    Json(data): Json<CompleteUploadRequest>,
) -> ApiResult<Json<UploadCompletedResponse>> {
    Ok(Json(state.uploads().complete(user_id, file_id, data).await?))
}

/// POST `/files/{id}/cancel-upload` — abort an in-progress upload.
pub async fn cancel_upload(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
    Json(data): Json<CancelUploadRequest>,
) -> ApiResult<StatusCode> {
    state.uploads().cancel(user_id, file_id, data).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/files/{id}` — fetch a file as owner or share viewer.
pub async fn get_file(
    State(state): State<AppState>,
    MaybeUser(viewer_id): MaybeUser,
    Path(file_id): Path<Uuid>,
    Query(query): Query<ShareQuery>,
) -> ApiResult<Json<FileResponse>> {
    Ok(Json(state.files().get_file(file_id, viewer_id, query.share).await?))
}

/// DELETE `/files/{id}` — owner delete.
pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(file_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.files().delete_file(user_id, file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
