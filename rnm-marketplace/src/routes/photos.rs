use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::api::ApiResponse;
use rnm_shared::types::auth::AuthUser;

use crate::services::photos;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PhotoUploadResponse {
    pub photo_url: String,
}

/// Takes the first multipart field as the image. The returned URL goes into
/// the listing's `photos` on create or edit.
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<PhotoUploadResponse>>)> {
    let actor = super::actor(&state, &user).await?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, format!("failed to read multipart: {e}")))?
        .ok_or_else(|| AppError::new(ErrorCode::PhotoUploadFailed, "no file provided"))?;

    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::new(ErrorCode::PhotoUploadFailed, format!("failed to read file data: {e}")))?;

    let photo_url =
        photos::upload_listing_photo(state.photos.as_ref(), &actor, &content_type, data.to_vec()).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(PhotoUploadResponse { photo_url }))))
}
