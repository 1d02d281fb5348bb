//! Handlers for folder operations and the root item listing.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::handlers::extract::{CurrentUser, MaybeUser, ShareQuery};
use crate::services::AppState;
use crate::services::folders_service::{CreateFolderRequest, FolderResponse, ItemResponse};

/// POST `/folders` — create a root folder or subfolder.
pub async fn create_folder(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(data): Json<CreateFolderRequest>,
) -> ApiResult<Json<FolderResponse>> {
    Ok(Json(state.folders().create(user_id, data).await?))
}

/// GET `/folders/{id}` — fetch a folder and its children, as owner or
/// share viewer.
pub async fn get_folder(
    State(state): State<AppState>,
    MaybeUser(viewer_id): MaybeUser,
    Path(folder_id): Path<Uuid>,
    Query(query): Query<ShareQuery>,
) -> ApiResult<Json<FolderResponse>> {
    Ok(Json(
        state.folders().get_folder(folder_id, viewer_id, query.share).await?,
    ))
}

/// DELETE `/folders/{id}` — owner delete; cleanup is asynchronous.
pub async fn delete_folder(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(folder_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.folders().delete_folder(user_id, folder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/items` — the owner's root-level folders and files.
pub async fn list_items(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<ItemResponse>>> {
    Ok(Json(state.folders().list_root_items(user_id).await?))
}
