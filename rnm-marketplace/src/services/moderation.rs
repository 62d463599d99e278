use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::PaginationParams;

use crate::models::{
    AdminAction, AdminActionType, Listing, NewAdminAction, ReviewState, ReviewStatus, UserProfile,
};
use crate::policy::{Actor, Capability};
use crate::store::{ListingRepository, ModerationRepository, Store, UserRepository};

/// Review state shown next to a listing.
pub fn derive_status(listing: &Listing) -> ReviewState {
    listing.review.state()
}

fn listing_not_found() -> AppError {
    AppError::new(ErrorCode::ListingNotFound, "listing not found")
}

fn required_reason(reason: &str, what: &str) -> AppResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("a reason is required to {what}"),
        ));
    }
    Ok(reason.to_string())
}

/// Deleted listings are out of the moderation flow.
async fn load_active(store: &dyn Store, id: Uuid) -> AppResult<Listing> {
    store
        .find_listing(id)
        .await?
        .filter(|l| l.is_active)
        .ok_or_else(listing_not_found)
}

/// Marks a listing verified. Works from pending and from rejected; the
/// previous state is kept in the audit metadata.
pub async fn approve(store: &dyn Store, actor: &Actor, listing_id: Uuid) -> AppResult<Listing> {
    actor.require(Capability::ModerateListings)?;
    let current = load_active(store, listing_id).await?;
    let previous = derive_status(&current);

    let action = NewAdminAction::new(actor.id, AdminActionType::Approve, listing_id)
        .with_metadata(serde_json::json!({ "previous_status": previous }));
    let listing = store
        .commit_review(listing_id, &ReviewStatus::Verified, action)
        .await?;

    tracing::info!(listing_id = %listing_id, admin_id = %actor.id, previous = %previous, "listing approved");
    Ok(listing)
}

pub async fn reject(
    store: &dyn Store,
    actor: &Actor,
    listing_id: Uuid,
    reason: &str,
) -> AppResult<Listing> {
    actor.require(Capability::ModerateListings)?;
    let reason = required_reason(reason, "reject a listing")?;
    let current = load_active(store, listing_id).await?;
    let previous = derive_status(&current);

    let action = NewAdminAction::new(actor.id, AdminActionType::Reject, listing_id)
        .with_reason(Some(reason.clone()))
        .with_metadata(serde_json::json!({ "previous_status": previous }));
    let listing = store
        .commit_review(listing_id, &ReviewStatus::Rejected { reason }, action)
        .await?;

    tracing::info!(listing_id = %listing_id, admin_id = %actor.id, "listing rejected");
    Ok(listing)
}

/// Hides a listing for good. The row is kept.
pub async fn soft_delete(
    store: &dyn Store,
    actor: &Actor,
    listing_id: Uuid,
    reason: Option<String>,
) -> AppResult<Listing> {
    actor.require(Capability::DeleteAnyListing)?;
    load_active(store, listing_id).await?;

    let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let action = NewAdminAction::new(actor.id, AdminActionType::DeleteListing, listing_id)
        .with_reason(reason);
    let listing = store.commit_deactivation(listing_id, action).await?;

    tracing::info!(listing_id = %listing_id, admin_id = %actor.id, "listing deleted");
    Ok(listing)
}

pub async fn block_user(
    store: &dyn Store,
    actor: &Actor,
    user_id: Uuid,
    reason: &str,
) -> AppResult<UserProfile> {
    actor.require(Capability::ManageUsers)?;
    if user_id == actor.id {
        return Err(AppError::new(ErrorCode::CannotBlockSelf, "you cannot block yourself"));
    }
    let reason = required_reason(reason, "block a user")?;

    let action = NewAdminAction::new(actor.id, AdminActionType::BlockUser, user_id)
        .with_reason(Some(reason));
    let user = store.commit_block(user_id, true, action).await?;

    tracing::info!(user_id = %user_id, admin_id = %actor.id, "user blocked");
    Ok(user)
}

pub async fn unblock_user(store: &dyn Store, actor: &Actor, user_id: Uuid) -> AppResult<UserProfile> {
    actor.require(Capability::ManageUsers)?;
    if user_id == actor.id {
        return Err(AppError::new(ErrorCode::CannotBlockSelf, "you cannot unblock yourself"));
    }

    let action = NewAdminAction::new(actor.id, AdminActionType::UnblockUser, user_id);
    let user = store.commit_block(user_id, false, action).await?;

    tracing::info!(user_id = %user_id, admin_id = %actor.id, "user unblocked");
    Ok(user)
}

pub async fn list_users(
    store: &dyn Store,
    actor: &Actor,
    params: &PaginationParams,
) -> AppResult<(Vec<UserProfile>, u64)> {
    actor.require(Capability::ViewDashboard)?;
    store.list_users(params).await
}

pub async fn audit_log(
    store: &dyn Store,
    actor: &Actor,
    params: &PaginationParams,
) -> AppResult<(Vec<AdminAction>, u64)> {
    actor.require(Capability::ViewAuditLog)?;
    store.audit_log(params).await
}
