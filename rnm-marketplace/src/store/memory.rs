use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::PaginationParams;

use super::{
    newest_first, ListingQuery, ListingRepository, ModerationRepository, SavedRepository,
    StatsCount, StatsRepository, UserRepository,
};
use crate::models::{
    AdminAction, EngagementCounter, Listing, ListingWithOwner, NewAdminAction, OwnerSummary,
    ReviewStatus, SavedListing, SavedListingWithListing, UserProfile,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, UserProfile>,
    listings: HashMap<Uuid, Listing>,
    saved: Vec<SavedListing>,
    actions: Vec<AdminAction>,
}

impl Tables {
    fn with_owner(&self, listing: &Listing) -> ListingWithOwner {
        let owner = self.users.get(&listing.owner_id).map(|u| OwnerSummary {
            name: u.name.clone(),
            phone: u.phone.clone(),
        });
        ListingWithOwner {
            listing: listing.clone(),
            owner,
        }
    }

    fn listing_mut(&mut self, id: Uuid) -> AppResult<&mut Listing> {
        self.listings.get_mut(&id).ok_or_else(listing_not_found)
    }

    fn active_listing_mut(&mut self, id: Uuid) -> AppResult<&mut Listing> {
        self.listings
            .get_mut(&id)
            .filter(|l| l.is_active)
            .ok_or_else(listing_not_found)
    }

    fn user_mut(&mut self, id: Uuid) -> AppResult<&mut UserProfile> {
        self.users.get_mut(&id).ok_or_else(user_not_found)
    }

    fn append(&mut self, action: NewAdminAction) {
        self.actions.push(action.into_action(Uuid::now_v7(), Utc::now()));
    }
}

fn listing_not_found() -> AppError {
    AppError::new(ErrorCode::ListingNotFound, "listing not found")
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

fn page<T: Clone>(rows: &[T], params: &PaginationParams) -> Vec<T> {
    rows.iter()
        .skip(usize::try_from(params.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(params.limit()).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

/// Process-local store. One lock guards every table, so each admin commit
/// is applied as a unit.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn ensure_user(&self, profile: UserProfile) -> AppResult<UserProfile> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.entry(profile.id).or_insert(profile).clone())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn update_user(&self, profile: &UserProfile) -> AppResult<UserProfile> {
        let mut tables = self.tables.lock().await;

        if let Some(username) = profile.username.as_deref() {
            let taken = tables
                .users
                .values()
                .any(|u| u.id != profile.id && u.username.as_deref() == Some(username));
            if taken {
                return Err(AppError::Validation(format!("username {username:?} is already taken")));
            }
        }

        let stored = tables.user_mut(profile.id)?;
        stored.role = profile.role;
        stored.name = profile.name.clone();
        stored.email = profile.email.clone();
        stored.username = profile.username.clone();
        stored.updated_at = profile.updated_at;
        Ok(stored.clone())
    }

    async fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<UserProfile>, u64)> {
        let tables = self.tables.lock().await;
        let mut users: Vec<UserProfile> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok((page(&users, params), users.len() as u64))
    }
}

#[async_trait]
impl ListingRepository for MemoryStore {
    async fn insert_listing(&self, listing: &Listing) -> AppResult<Listing> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&listing.owner_id) {
            return Err(user_not_found());
        }
        tables.listings.insert(listing.id, listing.clone());
        Ok(listing.clone())
    }

    async fn find_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        Ok(self.tables.lock().await.listings.get(&id).cloned())
    }

    async fn find_listing_with_owner(&self, id: Uuid) -> AppResult<Option<ListingWithOwner>> {
        let tables = self.tables.lock().await;
        Ok(tables.listings.get(&id).map(|l| tables.with_owner(l)))
    }

    async fn resubmit_listing(&self, listing: &Listing) -> AppResult<Listing> {
        let mut tables = self.tables.lock().await;
        let stored = tables.active_listing_mut(listing.id)?;

        stored.title = listing.title.clone();
        stored.category = listing.category.clone();
        stored.price = listing.price;
        stored.deposit = listing.deposit;
        stored.description = listing.description.clone();
        stored.rules = listing.rules.clone();
        stored.photos = listing.photos.clone();
        stored.city = listing.city.clone();
        stored.area = listing.area.clone();
        stored.landmark = listing.landmark.clone();
        stored.full_address = listing.full_address.clone();
        stored.gender = listing.gender;
        stored.food_type = listing.food_type;
        stored.review = ReviewStatus::Pending;
        stored.updated_at = listing.updated_at;

        Ok(stored.clone())
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> AppResult<Listing> {
        let mut tables = self.tables.lock().await;
        let stored = tables.active_listing_mut(id)?;
        stored.is_available = available;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Vec<ListingWithOwner>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<&Listing> = tables.listings.values().filter(|l| query.matches(l)).collect();
        rows.sort_by(|a, b| newest_first(a, b));
        Ok(rows.into_iter().map(|l| tables.with_owner(l)).collect())
    }

    async fn increment_counter(&self, id: Uuid, counter: EngagementCounter) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let listing = tables.listing_mut(id)?;
        match counter {
            EngagementCounter::Views => listing.view_count = listing.view_count.saturating_add(1),
            EngagementCounter::Contacts => {
                listing.contact_count = listing.contact_count.saturating_add(1)
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SavedRepository for MemoryStore {
    async fn find_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<Option<SavedListing>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .saved
            .iter()
            .find(|s| s.user_id == user_id && s.listing_id == listing_id)
            .cloned())
    }

    async fn insert_saved(&self, saved: &SavedListing) -> AppResult<SavedListing> {
        let mut tables = self.tables.lock().await;
        if !tables.listings.contains_key(&saved.listing_id) {
            return Err(listing_not_found());
        }
        if tables
            .saved
            .iter()
            .any(|s| s.user_id == saved.user_id && s.listing_id == saved.listing_id)
        {
            return Err(AppError::new(ErrorCode::AlreadySaved, "listing is already saved"));
        }
        tables.saved.push(saved.clone());
        Ok(saved.clone())
    }

    async fn delete_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.saved.len();
        tables
            .saved
            .retain(|s| !(s.user_id == user_id && s.listing_id == listing_id));
        Ok(tables.saved.len() < before)
    }

    async fn list_saved(&self, user_id: Uuid) -> AppResult<Vec<SavedListingWithListing>> {
        let tables = self.tables.lock().await;
        let mut saved: Vec<&SavedListing> = tables.saved.iter().filter(|s| s.user_id == user_id).collect();
        saved.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Ok(saved
            .into_iter()
            .filter_map(|s| {
                tables.listings.get(&s.listing_id).map(|l| SavedListingWithListing {
                    saved: s.clone(),
                    listing: tables.with_owner(l),
                })
            })
            .collect())
    }
}

#[async_trait]
impl ModerationRepository for MemoryStore {
    async fn commit_review(
        &self,
        listing_id: Uuid,
        status: &ReviewStatus,
        action: NewAdminAction,
    ) -> AppResult<Listing> {
        let mut tables = self.tables.lock().await;
        let listing = tables.listing_mut(listing_id)?;
        listing.review = status.clone();
        listing.updated_at = Utc::now();
        let updated = listing.clone();
        tables.append(action);
        Ok(updated)
    }

    async fn commit_deactivation(&self, listing_id: Uuid, action: NewAdminAction) -> AppResult<Listing> {
        let mut tables = self.tables.lock().await;
        let listing = tables.listing_mut(listing_id)?;
        listing.is_active = false;
        listing.updated_at = Utc::now();
        let updated = listing.clone();
        tables.append(action);
        Ok(updated)
    }

    async fn commit_block(
        &self,
        user_id: Uuid,
        blocked: bool,
        action: NewAdminAction,
    ) -> AppResult<UserProfile> {
        let mut tables = self.tables.lock().await;
        let user = tables.user_mut(user_id)?;
        user.is_blocked = blocked;
        user.updated_at = Utc::now();
        let updated = user.clone();
        tables.append(action);
        Ok(updated)
    }

    async fn audit_log(&self, params: &PaginationParams) -> AppResult<(Vec<AdminAction>, u64)> {
        let tables = self.tables.lock().await;
        let newest: Vec<AdminAction> = tables.actions.iter().rev().cloned().collect();
        Ok((page(&newest, params), newest.len() as u64))
    }
}

#[async_trait]
impl StatsRepository for MemoryStore {
    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.tables.lock().await.users.len() as i64)
    }

    async fn count_listings(&self, count: StatsCount) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables.listings.values().filter(|l| count.matches(l)).count() as i64)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminActionType, ListingType};

    fn listing_for(owner_id: Uuid) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::now_v7(),
            owner_id,
            title: "Mess near campus".into(),
            listing_type: ListingType::Mess,
            category: Some("veg".into()),
            price: 2500,
            deposit: 0,
            description: None,
            rules: None,
            photos: vec![],
            city: "Nashik".into(),
            area: "College Road".into(),
            landmark: None,
            full_address: None,
            gender: None,
            food_type: None,
            is_available: true,
            is_active: true,
            review: ReviewStatus::Pending,
            view_count: 0,
            contact_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn ensure_user_keeps_the_first_profile() {
        let store = MemoryStore::new();
        let id = Uuid::now_v7();
        store.ensure_user(UserProfile::new(id, "+911111111111")).await.unwrap();
        let again = store.ensure_user(UserProfile::new(id, "+912222222222")).await.unwrap();
        assert_eq!(again.phone, "+911111111111");
    }

    #[tokio::test]
    async fn update_does_not_touch_counters() {
        let store = MemoryStore::new();
        let owner = store.ensure_user(UserProfile::new(Uuid::now_v7(), "+91")).await.unwrap();
        let listing = store.insert_listing(&listing_for(owner.id)).await.unwrap();
        store.increment_counter(listing.id, EngagementCounter::Views).await.unwrap();

        let mut edited = listing.clone();
        edited.title = "Renamed".into();
        let stored = store.resubmit_listing(&edited).await.unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.view_count, 1);
    }

    #[tokio::test]
    async fn availability_write_leaves_review_alone() {
        let store = MemoryStore::new();
        let owner = store.ensure_user(UserProfile::new(Uuid::now_v7(), "+91")).await.unwrap();
        let listing = store.insert_listing(&listing_for(owner.id)).await.unwrap();
        let reject = NewAdminAction::new(Uuid::now_v7(), AdminActionType::Reject, listing.id);
        let rejected = ReviewStatus::Rejected { reason: "Fake photos".into() };
        store.commit_review(listing.id, &rejected, reject).await.unwrap();

        let stored = store.set_availability(listing.id, false).await.unwrap();
        assert!(!stored.is_available);
        assert_eq!(stored.review, rejected);
    }

    #[tokio::test]
    async fn soft_deleted_rows_reject_owner_writes() {
        let store = MemoryStore::new();
        let owner = store.ensure_user(UserProfile::new(Uuid::now_v7(), "+91")).await.unwrap();
        let listing = store.insert_listing(&listing_for(owner.id)).await.unwrap();
        let delete = NewAdminAction::new(Uuid::now_v7(), AdminActionType::DeleteListing, listing.id);
        store.commit_deactivation(listing.id, delete).await.unwrap();

        let err = store.set_availability(listing.id, false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
        let err = store.resubmit_listing(&listing).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
    }

    #[tokio::test]
    async fn failed_commit_appends_nothing() {
        let store = MemoryStore::new();
        let admin = Uuid::now_v7();
        let missing = Uuid::now_v7();

        let err = store
            .commit_review(
                missing,
                &ReviewStatus::Verified,
                NewAdminAction::new(admin, AdminActionType::Approve, missing),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);

        let (entries, total) = store.audit_log(&PaginationParams::default()).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn taken_username_is_a_validation_error() {
        let store = MemoryStore::new();
        let mut a = store.ensure_user(UserProfile::new(Uuid::now_v7(), "+91")).await.unwrap();
        let mut b = store.ensure_user(UserProfile::new(Uuid::now_v7(), "+92")).await.unwrap();

        a.username = Some("ravi".into());
        store.update_user(&a).await.unwrap();

        b.username = Some("ravi".into());
        let err = store.update_user(&b).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
