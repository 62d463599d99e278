use chrono::Utc;
use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{SavedListing, SavedListingWithListing};
use crate::policy::{Actor, Capability};
use crate::store::{ListingRepository, SavedRepository, Store};

/// Lookup only; a missing bookmark is simply `false`.
pub async fn is_saved(store: &dyn Store, actor: &Actor, listing_id: Uuid) -> AppResult<bool> {
    actor.require(Capability::Browse)?;
    Ok(store.find_saved(actor.id, listing_id).await?.is_some())
}

pub async fn save(store: &dyn Store, actor: &Actor, listing_id: Uuid) -> AppResult<SavedListing> {
    actor.require(Capability::SaveListings)?;

    let listing = store.find_listing(listing_id).await?;
    if !listing.is_some_and(|l| l.is_active) {
        return Err(AppError::new(ErrorCode::ListingNotFound, "listing not found"));
    }

    let saved = SavedListing {
        id: Uuid::now_v7(),
        user_id: actor.id,
        listing_id,
        created_at: Utc::now(),
    };
    let saved = store.insert_saved(&saved).await?;

    tracing::debug!(user_id = %actor.id, listing_id = %listing_id, "listing saved");
    Ok(saved)
}

/// Fails with `SavedListingNotFound` when there was nothing to remove.
pub async fn unsave(store: &dyn Store, actor: &Actor, listing_id: Uuid) -> AppResult<()> {
    actor.require(Capability::SaveListings)?;

    if !store.delete_saved(actor.id, listing_id).await? {
        return Err(AppError::new(
            ErrorCode::SavedListingNotFound,
            "listing is not in your saved list",
        ));
    }
    tracing::debug!(user_id = %actor.id, listing_id = %listing_id, "listing unsaved");
    Ok(())
}

pub async fn list_for_user(store: &dyn Store, actor: &Actor) -> AppResult<Vec<SavedListingWithListing>> {
    actor.require(Capability::SaveListings)?;
    store.list_saved(actor.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::services::listings::{self, tests::{draft, owner_in}};
    use crate::store::{MemoryStore, UserRepository};

    async fn user_in(store: &MemoryStore) -> Actor {
        let profile = UserProfile::new(Uuid::now_v7(), "+919833333333");
        Actor::from(&store.ensure_user(profile).await.unwrap())
    }

    #[tokio::test]
    async fn duplicate_save_fails_and_stays_saved() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let user = user_in(&store).await;
        let listing = listings::create(&store, &owner, draft()).await.unwrap();

        assert!(!is_saved(&store, &user, listing.id).await.unwrap());
        save(&store, &user, listing.id).await.unwrap();
        assert!(is_saved(&store, &user, listing.id).await.unwrap());

        let err = save(&store, &user, listing.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadySaved);
        assert!(is_saved(&store, &user, listing.id).await.unwrap());
    }

    #[tokio::test]
    async fn unsave_reports_missing_bookmark() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let user = user_in(&store).await;
        let listing = listings::create(&store, &owner, draft()).await.unwrap();

        save(&store, &user, listing.id).await.unwrap();
        unsave(&store, &user, listing.id).await.unwrap();
        assert!(!is_saved(&store, &user, listing.id).await.unwrap());

        let err = unsave(&store, &user, listing.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SavedListingNotFound);
    }

    #[tokio::test]
    async fn saving_unknown_listing_fails() {
        let store = MemoryStore::new();
        let user = user_in(&store).await;
        let err = save(&store, &user, Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ListingNotFound);
    }

    #[tokio::test]
    async fn saved_list_is_newest_first_with_listing() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let user = user_in(&store).await;
        let first = listings::create(&store, &owner, draft()).await.unwrap();
        let second = listings::create(&store, &owner, draft()).await.unwrap();

        save(&store, &user, first.id).await.unwrap();
        save(&store, &user, second.id).await.unwrap();

        let saved = list_for_user(&store, &user).await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].listing.listing.id, second.id);
        assert_eq!(saved[0].listing.owner.as_ref().unwrap().phone, "+919811111111");
    }
}
