//! Defines routes for the vault API.
//!
//! ## Structure
//! - **Upload protocol**
//!   - `POST   /files/upload` — initiate a multipart upload
//!   - `POST   /files/{id}/complete-upload` — finalize
//!   - `POST   /files/{id}/cancel-upload` — abort
//!
//! - **Items**
//!   - `GET    /files/{id}` / `DELETE /files/{id}`
//!   - `POST   /folders`, `GET/DELETE /folders/{id}`
//!   - `GET    /items` — root listing
//!
//! - **Account & sharing**
//!   - `GET/DELETE /users/me`
//!   - `POST/GET /shared-links`, `GET/DELETE /shared-links/{id}`
//!
//! Read endpoints accept `?share=<link id>` for anonymous share viewers.

use crate::{
    handlers::{
        file_handlers::{cancel_upload, complete_upload, delete_file, get_file, initiate_upload},
        folder_handlers::{create_folder, delete_folder, get_folder, list_items},
        health_handlers::{healthz, readyz},
        share_handlers::{create_share, delete_share, get_shared_content, list_shares},
        user_handlers::{delete_me, get_me},
    },
    services::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload protocol
        .route("/files/upload", post(initiate_upload))
        .route("/files/{id}/complete-upload", post(complete_upload))
        .route("/files/{id}/cancel-upload", post(cancel_upload))
        // items
        .route("/files/{id}", get(get_file).delete(delete_file))
        .route("/folders", post(create_folder))
        .route("/folders/{id}", get(get_folder).delete(delete_folder))
        .route("/items", get(list_items))
        // account & sharing
        .route("/users/me", get(get_me).delete(delete_me))
        .route("/shared-links", post(create_share).get(list_shares))
        .route(
            "/shared-links/{id}",
            get(get_shared_content).delete(delete_share),
        )
}
