//! Caller identity extractors.
//!
//! Authentication itself lives upstream (out of scope here); the auth
//! layer terminates credentials and forwards the authenticated user id in
//! the `x-user-id` header. `CurrentUser` rejects requests without one,
//! `MaybeUser` admits anonymous callers so share links keep working.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::ApiError;

const USER_ID_HEADER: &str = "x-user-id";

/// An authenticated caller.
pub struct CurrentUser(pub Uuid);

/// A possibly-anonymous caller.
pub struct MaybeUser(pub Option<Uuid>);

/// `?share=<link id>` on read endpoints.
#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub share: Option<Uuid>,
}

fn user_from_header(parts: &Parts) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = parts.headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .map(Some)
        .ok_or_else(|| ApiError::Validation("Malformed x-user-id header.".into()))
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_header(parts)?
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Forbidden("Authentication required.".into()))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_from_header(parts)?))
    }
}
