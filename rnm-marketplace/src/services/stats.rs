use rnm_shared::errors::AppResult;

use crate::models::{DashboardStats, ListingType};
use crate::policy::{Actor, Capability};
use crate::store::{StatsCount, StatsRepository, Store};

/// Each figure is its own count, so the set is not a single snapshot.
pub async fn compute_dashboard_stats(store: &dyn Store, actor: &Actor) -> AppResult<DashboardStats> {
    actor.require(Capability::ViewDashboard)?;

    let (total_users, total_listings, active_listings, pending_listings, verified_listings, total_rooms, total_mess) =
        tokio::try_join!(
            store.count_users(),
            store.count_listings(StatsCount::All),
            store.count_listings(StatsCount::Active),
            store.count_listings(StatsCount::Pending),
            store.count_listings(StatsCount::Verified),
            store.count_listings(StatsCount::OfType(ListingType::Room)),
            store.count_listings(StatsCount::OfType(ListingType::Mess)),
        )?;

    Ok(DashboardStats {
        total_users,
        total_listings,
        active_listings,
        pending_listings,
        verified_listings,
        total_rooms,
        total_mess,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingType, UserProfile};
    use crate::services::listings::{self, tests::{draft, owner_in}, ListingDraft};
    use crate::services::moderation;
    use crate::store::{MemoryStore, UserRepository};
    use rnm_shared::errors::ErrorCode;
    use rnm_shared::types::auth::UserRole;
    use uuid::Uuid;

    #[tokio::test]
    async fn counts_follow_their_definitions() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let mut admin = UserProfile::new(Uuid::now_v7(), "+919844444444");
        admin.role = UserRole::Admin;
        let admin = Actor::from(&store.ensure_user(admin).await.unwrap());

        let verified = listings::create(&store, &owner, draft()).await.unwrap();
        moderation::approve(&store, &admin, verified.id).await.unwrap();

        let hidden = listings::create(&store, &owner, draft()).await.unwrap();
        listings::set_availability(&store, &owner, hidden.id, false).await.unwrap();

        let mess = ListingDraft {
            listing_type: ListingType::Mess,
            category: Some("veg".into()),
            ..draft()
        };
        let deleted = listings::create(&store, &owner, mess).await.unwrap();
        moderation::soft_delete(&store, &admin, deleted.id, None).await.unwrap();

        let stats = compute_dashboard_stats(&store, &admin).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.active_listings, 1);
        // the hidden one is still active and waiting for review
        assert_eq!(stats.pending_listings, 1);
        assert_eq!(stats.verified_listings, 1);
        assert_eq!(stats.total_rooms, 2);
        assert_eq!(stats.total_mess, 1);
    }

    #[tokio::test]
    async fn dashboard_is_admin_only() {
        let store = MemoryStore::new();
        let owner = owner_in(&store).await;
        let err = compute_dashboard_stats(&store, &owner).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
