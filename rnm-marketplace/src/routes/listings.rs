use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use rnm_shared::errors::AppResult;
use rnm_shared::middleware::OptionalAuthUser;
use rnm_shared::types::api::ApiResponse;
use rnm_shared::types::auth::AuthUser;

use crate::events::publisher;
use crate::models::{EngagementCounter, Listing, ListingWithOwner};
use crate::policy::Actor;
use crate::services::listings::{self, ListingDraft, ListingPatch};
use crate::store::{ListingFilter, UserRepository};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

// --- Public browse ---

pub async fn browse(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ListingFilter>,
) -> AppResult<Json<ApiResponse<Vec<ListingWithOwner>>>> {
    let items = listings::browse(state.store.as_ref(), filter).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ListingWithOwner>>> {
    // an unknown or stale token just browses anonymously
    let viewer = match user {
        Some(user) => state.store.find_user(user.id).await?.map(|p| Actor::from(&p)),
        None => None,
    };
    let listing = listings::get(state.store.as_ref(), viewer.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(listing)))
}

pub async fn record_view(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> StatusCode {
    listings::spawn_engagement(state.store.clone(), id, EngagementCounter::Views);
    StatusCode::ACCEPTED
}

pub async fn record_contact(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> StatusCode {
    listings::spawn_engagement(state.store.clone(), id, EngagementCounter::Contacts);
    StatusCode::ACCEPTED
}

// --- Owner ---

pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(draft): Json<ListingDraft>,
) -> AppResult<(StatusCode, Json<ApiResponse<Listing>>)> {
    let actor = super::actor(&state, &user).await?;
    let listing = listings::create(state.store.as_ref(), &actor, draft).await?;

    publisher::publish_listing_submitted(state.rabbitmq.as_ref(), &listing).await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok_with_message(listing, "listing submitted for review")),
    ))
}

pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<ListingPatch>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let actor = super::actor(&state, &user).await?;
    let listing = listings::update(state.store.as_ref(), &actor, id, patch).await?;

    publisher::publish_listing_submitted(state.rabbitmq.as_ref(), &listing).await;

    Ok(Json(ApiResponse::ok_with_message(listing, "listing updated and sent for review")))
}

pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AvailabilityRequest>,
) -> AppResult<Json<ApiResponse<Listing>>> {
    let actor = super::actor(&state, &user).await?;
    let listing = listings::set_availability(state.store.as_ref(), &actor, id, req.is_available).await?;
    Ok(Json(ApiResponse::ok(listing)))
}

pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<ListingWithOwner>>>> {
    let actor = super::actor(&state, &user).await?;
    let items = listings::list_for_owner(state.store.as_ref(), &actor).await?;
    Ok(Json(ApiResponse::ok(items)))
}
