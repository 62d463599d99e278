use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use rnm_shared::errors::AppResult;
use rnm_shared::types::auth::AuthUser;
use rnm_shared::types::api::ApiResponse;
use rnm_shared::types::pagination::{Paginated, PaginationParams};

use crate::events::publisher;
use crate::models::{AdminAction, DashboardStats, Listing, ListingWithOwner, UserProfile};
use crate::services::{listings, moderation, stats};
use crate::store::ListingFilter;
use crate::AppState;

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteListingRequest {
    pub reason: Option<String>,
}

// --- Dashboard ---

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let actor = super::actor(&state, &admin).await?;
    let stats = stats::compute_dashboard_stats(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

// --- Listings ---

pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Query(filter): Query<ListingFilter>,
) -> AppResult<Json<ApiResponse<Vec<ListingWithOwner>>>> {
    let actor = super::actor(&state, &admin).await?;
    let items = listings::list_all(state.store.as_ref(), &actor, filter).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<ListingWithOwner>>>> {
    let actor = super::actor(&state, &admin).await?;
    let items = listings::list_pending(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn approve_listing(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let actor = super::actor(&state, &admin).await?;
    let listing = moderation::approve(state.store.as_ref(), &actor, id).await?;

    publisher::publish_listing_approved(state.rabbitmq.as_ref(), &listing, actor.id).await;

    Ok(Json(ApiResponse::ok_with_message(listing, "listing approved")))
}

pub async fn reject_listing(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let actor = super::actor(&state, &admin).await?;
    let listing = moderation::reject(state.store.as_ref(), &actor, id, &req.reason).await?;

    publisher::publish_listing_rejected(state.rabbitmq.as_ref(), &listing, actor.id).await;

    Ok(Json(ApiResponse::ok_with_message(listing, "listing rejected")))
}

/// The body is optional; `{"reason": "..."}` is recorded in the audit log.
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<DeleteListingRequest>>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let actor = super::actor(&state, &admin).await?;
    let reason = body.and_then(|Json(req)| req.reason);
    let listing = moderation::soft_delete(state.store.as_ref(), &actor, id, reason.clone()).await?;

    publisher::publish_listing_deleted(state.rabbitmq.as_ref(), &listing, actor.id, reason).await;

    Ok(Json(ApiResponse::ok_with_message(listing, "listing deleted")))
}

// --- Users ---

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<UserProfile>>>> {
    let actor = super::actor(&state, &admin).await?;
    let (items, total) = moderation::list_users(state.store.as_ref(), &actor, &params).await?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}

pub async fn block_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReasonRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let actor = super::actor(&state, &admin).await?;
    let user = moderation::block_user(state.store.as_ref(), &actor, id, &req.reason).await?;

    let reason = Some(req.reason.trim().to_string());
    publisher::publish_user_block_changed(state.rabbitmq.as_ref(), &user, actor.id, reason).await;

    Ok(Json(ApiResponse::ok_with_message(user, "user blocked")))
}

pub async fn unblock_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let actor = super::actor(&state, &admin).await?;
    let user = moderation::unblock_user(state.store.as_ref(), &actor, id).await?;

    publisher::publish_user_block_changed(state.rabbitmq.as_ref(), &user, actor.id, None).await;

    Ok(Json(ApiResponse::ok_with_message(user, "user unblocked")))
}

// --- Audit ---

pub async fn get_audit_log(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<AdminAction>>>> {
    let actor = super::actor(&state, &admin).await?;
    let (items, total) = moderation::audit_log(state.store.as_ref(), &actor, &params).await?;
    Ok(Json(ApiResponse::ok(Paginated::new(items, total, &params))))
}
