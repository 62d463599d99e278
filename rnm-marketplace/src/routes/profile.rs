use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use rnm_shared::errors::AppResult;
use rnm_shared::types::api::ApiResponse;
use rnm_shared::types::auth::AuthUser;

use crate::models::UserProfile;
use crate::policy::RoleView;
use crate::services::users::{self, UpdateProfileRequest};
use crate::AppState;

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let actor = super::actor(&state, &user).await?;
    let profile = users::get_profile(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let actor = super::actor(&state, &user).await?;
    let profile = users::update_profile(state.store.as_ref(), &actor, req).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let actor = super::actor(&state, &user).await?;
    let profile = users::upgrade_to_owner(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok_with_message(profile, "you are now an owner")))
}

/// What the client may show: capabilities and navigation tabs for the stored role.
pub async fn capabilities(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RoleView>>> {
    let actor = super::actor(&state, &user).await?;
    Ok(Json(ApiResponse::ok(RoleView::from(actor))))
}
