//! Handlers for shared links.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::handlers::extract::CurrentUser;
use crate::models::shared_link::SharedItemType;
use crate::services::AppState;
use crate::services::files_service::FileResponse;
use crate::services::folders_service::FolderResponse;
use crate::services::share_service::{CreateSharedLinkRequest, SharedLinkResponse};

/// The item behind a shared link.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SharedContentResponse {
    File(Box<FileResponse>),
    Folder(Box<FolderResponse>),
}

/// POST `/shared-links` — share an owned item.
pub async fn create_share(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(data): Json<CreateSharedLinkRequest>,
) -> ApiResult<Json<SharedLinkResponse>> {
    Ok(Json(state.shares().create(user_id, data).await?))
}

/// GET `/shared-links` — the caller's links.
pub async fn list_shares(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<SharedLinkResponse>>> {
    Ok(Json(state.shares().list(user_id).await?))
}

/// GET `/shared-links/{id}` — anonymous read of the shared item.
pub async fn get_shared_content(
    State(state): State<AppState>,
    Path(share_id): Path<Uuid>,
) -> ApiResult<Json<SharedContentResponse>> {
    let link = state.shares().get_link(share_id).await?;

    let content = match link.item_type {
        SharedItemType::File => SharedContentResponse::File(Box::new(
            state.files().get_file(link.item_id, None, Some(share_id)).await?,
        )),
        SharedItemType::Folder => SharedContentResponse::Folder(Box::new(
            state
                .folders()
                .get_folder(link.item_id, None, Some(share_id))
                .await?,
        )),
    };

    Ok(Json(content))
}

/// DELETE `/shared-links/{id}` — revoke a link.
pub async fn delete_share(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(share_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.shares().delete(user_id, share_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
