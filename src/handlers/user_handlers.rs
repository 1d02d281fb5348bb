//! Handlers for the current account.

use axum::{Json, extract::State, http::StatusCode};

use crate::errors::ApiResult;
use crate::handlers::extract::CurrentUser;
use crate::services::AppState;
use crate::services::users_service::AccountResponse;

/// GET `/users/me` — account data plus the storage usage summary.
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<AccountResponse>> {
    Ok(Json(state.users().get_account(user_id).await?))
}

/// DELETE `/users/me` — queue the account for deletion.
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<StatusCode> {
    state.users().delete_account(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
