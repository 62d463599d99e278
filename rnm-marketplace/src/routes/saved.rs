use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use rnm_shared::errors::{AppResult, ErrorCode};
use rnm_shared::types::api::ApiResponse;
use rnm_shared::types::auth::AuthUser;

use crate::models::{SavedListing, SavedListingWithListing};
use crate::services::saved;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SavedStatus {
    pub saved: bool,
}

#[derive(Debug, Serialize)]
pub struct UnsaveResponse {
    pub removed: bool,
}

pub async fn list_saved(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<SavedListingWithListing>>>> {
    let actor = super::actor(&state, &user).await?;
    let items = saved::list_for_user(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn check_saved(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SavedStatus>>> {
    let actor = super::actor(&state, &user).await?;
    let saved = saved::is_saved(state.store.as_ref(), &actor, listing_id).await?;
    Ok(Json(ApiResponse::ok(SavedStatus { saved })))
}

pub async fn save_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ApiResponse<SavedListing>>)> {
    let actor = super::actor(&state, &user).await?;
    let saved = saved::save(state.store.as_ref(), &actor, listing_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(saved))))
}

/// Removing a bookmark that is already gone still succeeds, with `removed: false`.
pub async fn unsave_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(listing_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UnsaveResponse>>> {
    let actor = super::actor(&state, &user).await?;
    let removed = match saved::unsave(state.store.as_ref(), &actor, listing_id).await {
        Ok(()) => true,
        Err(e) if e.code() == ErrorCode::SavedListingNotFound => false,
        Err(e) => return Err(e),
    };
    Ok(Json(ApiResponse::ok(UnsaveResponse { removed })))
}
