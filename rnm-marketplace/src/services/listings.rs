use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    EngagementCounter, FoodType, Gender, Listing, ListingType, ListingWithOwner, ReviewStatus,
    MAX_PHOTOS,
};
use crate::policy::{Actor, Capability};
use crate::store::{ListingFilter, ListingQuery, ListingRepository, ListingScope, Store};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListingDraft {
    #[validate(length(max = 120, message = "title must be at most 120 characters"))]
    pub title: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub category: Option<String>,
    pub price: i32,
    #[serde(default)]
    pub deposit: i32,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 1000, message = "rules must be at most 1000 characters"))]
    pub rules: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: String,
    #[validate(length(max = 100, message = "area must be at most 100 characters"))]
    pub area: String,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<Gender>,
    pub food_type: Option<FoodType>,
}

/// Partial edit. `type` is not accepted: a listing keeps its type for life.
/// An empty string clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ListingPatch {
    #[validate(length(max = 120, message = "title must be at most 120 characters"))]
    pub title: Option<String>,
    pub category: Option<String>,
    pub price: Option<i32>,
    pub deposit: Option<i32>,
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 1000, message = "rules must be at most 1000 characters"))]
    pub rules: Option<String>,
    pub photos: Option<Vec<String>>,
    #[validate(length(max = 100, message = "city must be at most 100 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 100, message = "area must be at most 100 characters"))]
    pub area: Option<String>,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<Gender>,
    pub food_type: Option<FoodType>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validation(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCode::ValidationError, message)
}

fn listing_not_found() -> AppError {
    AppError::new(ErrorCode::ListingNotFound, "listing not found")
}

/// Checks that hold for every stored listing, after create or edit.
fn check_listing(listing: &Listing) -> AppResult<()> {
    if listing.title.is_empty() {
        return Err(validation("title is required"));
    }
    if listing.price <= 0 {
        return Err(validation("price must be a positive amount"));
    }
    if listing.deposit < 0 {
        return Err(validation("deposit cannot be negative"));
    }
    if listing.city.is_empty() {
        return Err(validation("city is required"));
    }
    if listing.area.is_empty() {
        return Err(validation("area is required"));
    }
    if listing.photos.len() > MAX_PHOTOS {
        return Err(AppError::with_details(
            ErrorCode::TooManyPhotos,
            format!("a listing can have at most {MAX_PHOTOS} photos"),
            serde_json::json!({ "max": MAX_PHOTOS, "given": listing.photos.len() }),
        ));
    }
    if let Some(category) = listing.category.as_deref() {
        let allowed = listing.listing_type.categories();
        if !allowed.contains(&category) {
            return Err(AppError::with_details(
                ErrorCode::InvalidCategory,
                format!("{category:?} is not a {} category", listing.listing_type.as_str()),
                serde_json::json!({ "allowed": allowed }),
            ));
        }
    }
    Ok(())
}

fn validate_request<T: Validate>(req: &T) -> AppResult<()> {
    req.validate().map_err(|e| validation(e.to_string()))
}

pub async fn create(store: &dyn Store, actor: &Actor, draft: ListingDraft) -> AppResult<Listing> {
    actor.require(Capability::CreateListing)?;
    validate_request(&draft)?;

    let now = Utc::now();
    let listing = Listing {
        id: Uuid::now_v7(),
        owner_id: actor.id,
        title: draft.title.trim().to_string(),
        listing_type: draft.listing_type,
        category: clean(draft.category),
        price: draft.price,
        deposit: draft.deposit,
        description: clean(draft.description),
        rules: clean(draft.rules),
        photos: draft.photos,
        city: draft.city.trim().to_string(),
        area: draft.area.trim().to_string(),
        landmark: clean(draft.landmark),
        full_address: clean(draft.full_address),
        gender: draft.gender,
        food_type: draft.food_type,
        is_available: true,
        is_active: true,
        review: ReviewStatus::Pending,
        view_count: 0,
        contact_count: 0,
        created_at: now,
        updated_at: now,
    };
    check_listing(&listing)?;

    let listing = store.insert_listing(&listing).await?;
    tracing::info!(listing_id = %listing.id, owner_id = %listing.owner_id, "listing created");
    Ok(listing)
}

/// Applies an owner edit. Any edit sends the listing back to review.
pub async fn update(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    patch: ListingPatch,
) -> AppResult<Listing> {
    actor.require(Capability::EditOwnListing)?;
    validate_request(&patch)?;

    let mut listing = load_active(store, id).await?;
    actor.require_owner(&listing)?;
    let previous = listing.review.state();

    if let Some(title) = patch.title {
        listing.title = title.trim().to_string();
    }
    if let Some(category) = patch.category {
        listing.category = clean(Some(category));
    }
    if let Some(price) = patch.price {
        listing.price = price;
    }
    if let Some(deposit) = patch.deposit {
        listing.deposit = deposit;
    }
    if let Some(description) = patch.description {
        listing.description = clean(Some(description));
    }
    if let Some(rules) = patch.rules {
        listing.rules = clean(Some(rules));
    }
    if let Some(photos) = patch.photos {
        listing.photos = photos;
    }
    if let Some(city) = patch.city {
        listing.city = city.trim().to_string();
    }
    if let Some(area) = patch.area {
        listing.area = area.trim().to_string();
    }
    if let Some(landmark) = patch.landmark {
        listing.landmark = clean(Some(landmark));
    }
    if let Some(full_address) = patch.full_address {
        listing.full_address = clean(Some(full_address));
    }
    if patch.gender.is_some() {
        listing.gender = patch.gender;
    }
    if patch.food_type.is_some() {
        listing.food_type = patch.food_type;
    }
    check_listing(&listing)?;
    listing.updated_at = Utc::now();

    let listing = store.resubmit_listing(&listing).await?;
    tracing::info!(listing_id = %listing.id, previous = %previous, "listing edited, back to review");
    Ok(listing)
}

/// Visibility switch. Review status is left as it is.
pub async fn set_availability(
    store: &dyn Store,
    actor: &Actor,
    id: Uuid,
    available: bool,
) -> AppResult<Listing> {
    actor.require(Capability::ToggleOwnAvailability)?;

    let listing = load_active(store, id).await?;
    actor.require_owner(&listing)?;

    let listing = store.set_availability(id, available).await?;
    tracing::info!(listing_id = %listing.id, available, "listing availability changed");
    Ok(listing)
}

/// Soft-deleted listings are only visible to their owner and to admins.
pub async fn get(store: &dyn Store, viewer: Option<&Actor>, id: Uuid) -> AppResult<ListingWithOwner> {
    let found = store.find_listing_with_owner(id).await?.ok_or_else(listing_not_found)?;

    if !found.listing.is_active {
        let privileged = viewer.is_some_and(|v| v.is_admin() || v.id == found.listing.owner_id);
        if !privileged {
            return Err(listing_not_found());
        }
    }
    Ok(found)
}

pub async fn browse(store: &dyn Store, filter: ListingFilter) -> AppResult<Vec<ListingWithOwner>> {
    filter.validate()?;
    store
        .query_listings(&ListingQuery::new(ListingScope::Browse).with_filter(filter))
        .await
}

pub async fn list_for_owner(store: &dyn Store, actor: &Actor) -> AppResult<Vec<ListingWithOwner>> {
    actor.require(Capability::EditOwnListing)?;
    store
        .query_listings(&ListingQuery::new(ListingScope::Owner(actor.id)))
        .await
}

pub async fn list_pending(store: &dyn Store, actor: &Actor) -> AppResult<Vec<ListingWithOwner>> {
    actor.require(Capability::ModerateListings)?;
    store
        .query_listings(&ListingQuery::new(ListingScope::PendingReview))
        .await
}

pub async fn list_all(
    store: &dyn Store,
    actor: &Actor,
    filter: ListingFilter,
) -> AppResult<Vec<ListingWithOwner>> {
    actor.require(Capability::ModerateListings)?;
    filter.validate()?;
    store
        .query_listings(&ListingQuery::new(ListingScope::All).with_filter(filter))
        .await
}

pub async fn record_engagement(store: &dyn Store, id: Uuid, counter: EngagementCounter) -> AppResult<()> {
    store.increment_counter(id, counter).await
}

/// Fire-and-forget counter bump; a failure is logged and otherwise ignored.
pub fn spawn_engagement(store: Arc<dyn Store>, id: Uuid, counter: EngagementCounter) {
    tokio::spawn(async move {
        if let Err(e) = record_engagement(store.as_ref(), id, counter).await {
            tracing::warn!(listing_id = %id, ?counter, error = %e, "engagement counter not recorded");
        }
    });
}

async fn load_active(store: &dyn Store, id: Uuid) -> AppResult<Listing> {
    store
        .find_listing(id)
        .await?
        .filter(|l| l.is_active)
        .ok_or_else(listing_not_found)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{AdminActionType, NewAdminAction, ReviewState, UserProfile};
    use crate::store::{ListingRepository, MemoryStore, ModerationRepository, UserRepository};
    use rnm_shared::types::auth::UserRole;

    pub(crate) async fn owner_in(store: &MemoryStore) -> Actor {
        let mut profile = UserProfile::new(Uuid::now_v7(), "+919811111111");
        profile.role = UserRole::Owner;
        Actor::from(&store.ensure_user(profile).await.unwrap())
    }

    async fn commit_status(store: &MemoryStore, id: Uuid, status: ReviewStatus) -> Listing {
        let action_type = match status {
            ReviewStatus::Rejected { .. } => AdminActionType::Reject,
            _ => AdminActionType::Approve,
        };
        let action = NewAdminAction::new(Uuid::now_v7(), action_type, id);
        store.commit_review(id, &status, action).await.unwrap()
    }

    pub(crate) fn draft() -> ListingDraft {
        ListingDraft {
            title: "Single room near FC Road".into(),
            listing_type: ListingType::Room,
            category: Some("single".into()),
            price: 5000,
            deposit: 10000,
            description: Some("  ".into()),
            rules: None,
            photos: vec![],
            city: "Pune".into(),
            area: "Kothrud".into(),
            landmark: None,
            full_address: None,
            gender: Some(Gender::Boys),
            food_type: None,
        }
    }

    #[tokio::test]
    async fn create_starts_pending_and_available() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;

        let listing = create(&store, &owner, draft()).await.unwrap();
        assert_eq!(listing.review, ReviewStatus::Pending);
        assert!(listing.is_available && listing.is_active);
        assert_eq!(listing.view_count, 0);
        assert_eq!(listing.description, None);
    }

    #[tokio::test]
    async fn create_rejects_bad_drafts() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;

        let cases: Vec<(ListingDraft, ErrorCode)> = vec![
            (ListingDraft { title: "   ".into(), ..draft() }, ErrorCode::ValidationError),
            (ListingDraft { price: 0, ..draft() }, ErrorCode::ValidationError),
            (ListingDraft { deposit: -1, ..draft() }, ErrorCode::ValidationError),
            (ListingDraft { area: "".into(), ..draft() }, ErrorCode::ValidationError),
            (ListingDraft { photos: vec!["p".into(); 6], ..draft() }, ErrorCode::TooManyPhotos),
            (ListingDraft { category: Some("veg".into()), ..draft() }, ErrorCode::InvalidCategory),
        ];

        for (bad, expected) in cases {
            let err = create(&store, &owner, bad).await.unwrap_err();
            assert_eq!(err.code(), expected);
        }
    }

    #[tokio::test]
    async fn plain_users_cannot_create() {
        let store = MemoryStore::new();
        let user = Actor::from(
            &store
                .ensure_user(UserProfile::new(Uuid::now_v7(), "+91"))
                .await
                .unwrap(),
        );
        let err = create(&store, &user, draft()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn editing_a_verified_listing_forces_review() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();
        commit_status(&store, listing.id, ReviewStatus::Verified).await;

        let edited = update(
            &store,
            &owner,
            listing.id,
            ListingPatch {
                price: Some(5500),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(edited.review.state(), ReviewState::Pending);
        assert_eq!(edited.review.to_columns(), (false, None));
        assert_eq!(edited.price, 5500);
    }

    #[tokio::test]
    async fn only_the_owner_edits() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let other = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();

        let err = update(&store, &other, listing.id, ListingPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotListingOwner);

        let err = set_availability(&store, &other, listing.id, false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotListingOwner);
    }

    #[tokio::test]
    async fn availability_keeps_review_status() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();
        commit_status(&store, listing.id, ReviewStatus::Verified).await;

        let hidden = set_availability(&store, &owner, listing.id, false).await.unwrap();
        assert!(!hidden.is_available);
        assert_eq!(hidden.review, ReviewStatus::Verified);

        let browse = browse(&store, ListingFilter::default()).await.unwrap();
        assert!(browse.is_empty());
        assert_eq!(list_for_owner(&store, &owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn toggle_after_a_rejection_keeps_the_rejection() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();

        // the owner's screen still shows the listing as pending
        let stale = load_active(&store, listing.id).await.unwrap();
        commit_status(&store, listing.id, ReviewStatus::Rejected { reason: "Fake photos".into() }).await;

        let hidden = set_availability(&store, &owner, stale.id, false).await.unwrap();
        assert!(!hidden.is_available);
        assert_eq!(hidden.review.rejection_reason(), Some("Fake photos"));

        let stored = store.find_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(stored.review.rejection_reason(), Some("Fake photos"));
    }

    #[tokio::test]
    async fn edit_does_not_restore_a_stale_availability() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();

        let mut stale = listing.clone();
        set_availability(&store, &owner, listing.id, false).await.unwrap();

        stale.title = "Renamed".into();
        let stored = store.resubmit_listing(&stale).await.unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(!stored.is_available);
    }

    #[tokio::test]
    async fn resubmit_ignores_the_callers_review_status() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let mut listing = create(&store, &owner, draft()).await.unwrap();
        commit_status(&store, listing.id, ReviewStatus::Rejected { reason: "Blurry".into() }).await;

        listing.review = ReviewStatus::Verified;
        let stored = store.resubmit_listing(&listing).await.unwrap();
        assert_eq!(stored.review, ReviewStatus::Pending);
    }

    #[tokio::test]
    async fn admins_filter_by_review_status() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let mut profile = UserProfile::new(Uuid::now_v7(), "+919822222222");
        profile.role = UserRole::Admin;
        let admin = Actor::from(&store.ensure_user(profile).await.unwrap());

        let pending = create(&store, &owner, draft()).await.unwrap();
        let rejected = create(&store, &owner, draft()).await.unwrap();
        let verified = create(&store, &owner, draft()).await.unwrap();
        commit_status(&store, rejected.id, ReviewStatus::Rejected { reason: "Blurry".into() }).await;
        commit_status(&store, verified.id, ReviewStatus::Verified).await;

        let only = |state| ListingFilter {
            status: Some(state),
            ..Default::default()
        };
        for (state, expected) in [
            (ReviewState::Pending, pending.id),
            (ReviewState::Rejected, rejected.id),
            (ReviewState::Verified, verified.id),
        ] {
            let found = list_all(&store, &admin, only(state)).await.unwrap();
            let ids: Vec<Uuid> = found.iter().map(|l| l.listing.id).collect();
            assert_eq!(ids, vec![expected], "{state:?}");
        }

        let err = list_all(&store, &owner, only(ReviewState::Pending)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn blocked_owner_cannot_edit() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();

        let blocked = Actor {
            is_blocked: true,
            ..owner
        };
        let err = update(&store, &blocked, listing.id, ListingPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserBlocked);
    }

    #[tokio::test]
    async fn soft_deleted_listing_is_hidden_from_strangers() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let stranger = owner_in(&store).await;
        let listing = create(&store, &owner, draft()).await.unwrap();
        store
            .commit_deactivation(
                listing.id,
                NewAdminAction::new(Uuid::now_v7(), AdminActionType::DeleteListing, listing.id),
            )
            .await
            .unwrap();

        assert!(get(&store, Some(&owner), listing.id).await.is_ok());
        let err = get(&store, Some(&stranger), listing.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
        let err = get(&store, None, listing.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
    }

    #[tokio::test]
    async fn engagement_on_missing_listing_fails_quietly_at_the_store() {
        let store = MemoryStore::new();
        let err = record_engagement(&store, Uuid::now_v7(), EngagementCounter::Contacts)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
    }
}
