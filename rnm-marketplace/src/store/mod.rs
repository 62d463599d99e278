//! Persistence seam. Services only talk to `dyn Store`; the backend is picked
//! at startup from `AppConfig::storage`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult};
use rnm_shared::types::PaginationParams;

use crate::models::{
    AdminAction, EngagementCounter, FoodType, Gender, Listing, ListingType, ListingWithOwner,
    NewAdminAction, ReviewState, ReviewStatus, SavedListing, SavedListingWithListing, UserProfile,
};

/// Browse filters. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    #[serde(rename = "type")]
    pub listing_type: Option<ListingType>,
    pub city: Option<String>,
    pub gender: Option<Gender>,
    pub food_type: Option<FoodType>,
    pub category: Option<String>,
    pub verified: Option<bool>,
    /// Finer than `verified`: tells pending and rejected apart.
    pub status: Option<ReviewState>,
    pub min_price: Option<i32>,
    pub max_price: Option<i32>,
}

impl ListingFilter {
    pub fn validate(&self) -> AppResult<()> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AppError::Validation(format!(
                    "min_price ({min}) must not exceed max_price ({max})"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.listing_type.map_or(true, |t| listing.listing_type == t)
            && self.city.as_deref().map_or(true, |c| listing.city == c)
            && self.gender.map_or(true, |g| listing.gender == Some(g))
            && self.food_type.map_or(true, |f| listing.food_type == Some(f))
            && self
                .category
                .as_deref()
                .map_or(true, |c| listing.category.as_deref() == Some(c))
            && self.verified.map_or(true, |v| listing.review.is_verified() == v)
            && self.status.map_or(true, |s| listing.review.state() == s)
            && self.min_price.map_or(true, |min| listing.price >= min)
            && self.max_price.map_or(true, |max| listing.price <= max)
    }
}

/// Which slice of the listing table a query runs over, before filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Active and available: the public browse surface.
    Browse,
    /// Everything one owner has created, including soft-deleted rows.
    Owner(Uuid),
    /// Active listings waiting for a decision.
    PendingReview,
    All,
}

impl ListingScope {
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            ListingScope::Browse => listing.is_listed(),
            ListingScope::Owner(owner_id) => listing.owner_id == *owner_id,
            ListingScope::PendingReview => {
                listing.is_active && listing.review.state() == ReviewState::Pending
            }
            ListingScope::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub scope: ListingScope,
    pub filter: ListingFilter,
}

impl ListingQuery {
    pub fn new(scope: ListingScope) -> Self {
        Self {
            scope,
            filter: ListingFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ListingFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.scope.matches(listing) && self.filter.matches(listing)
    }
}

/// Newest first; ties broken by id so pages are stable.
pub fn newest_first(a: &Listing, b: &Listing) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

/// Dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsCount {
    All,
    /// Active and available.
    Active,
    /// Active and awaiting review.
    Pending,
    Verified,
    OfType(ListingType),
}

impl StatsCount {
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            StatsCount::All => true,
            StatsCount::Active => listing.is_listed(),
            StatsCount::Pending => ListingScope::PendingReview.matches(listing),
            StatsCount::Verified => listing.review.is_verified(),
            StatsCount::OfType(t) => listing.listing_type == *t,
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the profile unless one already exists, then returns the stored row.
    async fn ensure_user(&self, profile: UserProfile) -> AppResult<UserProfile>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>>;
    /// Writes role, name, email and username.
    async fn update_user(&self, profile: &UserProfile) -> AppResult<UserProfile>;
    async fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<UserProfile>, u64)>;
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert_listing(&self, listing: &Listing) -> AppResult<Listing>;
    async fn find_listing(&self, id: Uuid) -> AppResult<Option<Listing>>;
    async fn find_listing_with_owner(&self, id: Uuid) -> AppResult<Option<ListingWithOwner>>;
    /// Writes owner-editable content and puts the listing back to pending.
    /// Availability, counters, owner, type and `is_active` are left as stored.
    /// `ListingNotFound` when the row is missing or soft-deleted.
    async fn resubmit_listing(&self, listing: &Listing) -> AppResult<Listing>;
    /// Touches `is_available` only. `ListingNotFound` as for `resubmit_listing`.
    async fn set_availability(&self, id: Uuid, available: bool) -> AppResult<Listing>;
    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Vec<ListingWithOwner>>;
    /// Atomic `+1`; fails with `ListingNotFound` when no row matched.
    async fn increment_counter(&self, id: Uuid, counter: EngagementCounter) -> AppResult<()>;
}

#[async_trait]
pub trait SavedRepository: Send + Sync {
    async fn find_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<Option<SavedListing>>;
    /// `AlreadySaved` on a duplicate pair, `ListingNotFound` on a dangling listing.
    async fn insert_saved(&self, saved: &SavedListing) -> AppResult<SavedListing>;
    /// Returns whether a row was removed.
    async fn delete_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<bool>;
    async fn list_saved(&self, user_id: Uuid) -> AppResult<Vec<SavedListingWithListing>>;
}

/// Admin mutations. Each commits the audit entry and the state change
/// together, or neither.
#[async_trait]
pub trait ModerationRepository: Send + Sync {
    async fn commit_review(
        &self,
        listing_id: Uuid,
        status: &ReviewStatus,
        action: NewAdminAction,
    ) -> AppResult<Listing>;
    async fn commit_deactivation(&self, listing_id: Uuid, action: NewAdminAction) -> AppResult<Listing>;
    async fn commit_block(
        &self,
        user_id: Uuid,
        blocked: bool,
        action: NewAdminAction,
    ) -> AppResult<UserProfile>;
    /// Newest first, with the total row count.
    async fn audit_log(&self, params: &PaginationParams) -> AppResult<(Vec<AdminAction>, u64)>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn count_users(&self) -> AppResult<i64>;
    async fn count_listings(&self, count: StatsCount) -> AppResult<i64>;
    /// Cheap round trip for the health endpoint.
    async fn ping(&self) -> AppResult<()>;
}

pub trait Store:
    UserRepository + ListingRepository + SavedRepository + ModerationRepository + StatsRepository
{
}

impl<T> Store for T where
    T: UserRepository + ListingRepository + SavedRepository + ModerationRepository + StatsRepository
{
}
