use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use uuid::Uuid;

use rnm_shared::clients::db::DbPool;
use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::PaginationParams;

use super::{
    ListingQuery, ListingRepository, ListingScope, ModerationRepository, SavedRepository,
    StatsCount, StatsRepository, UserRepository,
};
use crate::models::{
    AdminAction, AdminActionRecord, EngagementCounter, Listing, ListingContentChangeset,
    ListingRecord, ListingWithOwner, NewAdminAction, NewAdminActionRecord, NewListingRecord,
    NewUserRecord, OwnerSummary, ReviewState, ReviewStatus, SavedListing, SavedListingWithListing,
    UserChangeset, UserProfile, UserRecord,
};
use crate::schema::{admin_actions, listings, saved_listings, user_profiles};

fn listing_not_found() -> AppError {
    AppError::new(ErrorCode::ListingNotFound, "listing not found")
}

fn sql_offset(params: &PaginationParams) -> i64 {
    i64::try_from(params.offset()).unwrap_or(i64::MAX)
}

fn sql_limit(params: &PaginationParams) -> i64 {
    i64::try_from(params.limit()).unwrap_or(i64::MAX)
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

fn with_owner((row, owner): (ListingRecord, OwnerSummary)) -> AppResult<ListingWithOwner> {
    Ok(ListingWithOwner {
        listing: Listing::try_from(row)?,
        owner: Some(owner),
    })
}

fn insert_action(conn: &mut PgConnection, action: NewAdminAction) -> AppResult<()> {
    let record = NewAdminActionRecord::from(&action.into_action(Uuid::now_v7(), Utc::now()));
    diesel::insert_into(admin_actions::table)
        .values(&record)
        .execute(conn)?;
    Ok(())
}

/// Diesel-backed store over the shared r2d2 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn ensure_user(&self, profile: UserProfile) -> AppResult<UserProfile> {
        let mut conn = self.conn()?;

        diesel::insert_into(user_profiles::table)
            .values(&NewUserRecord::from(&profile))
            .on_conflict(user_profiles::id)
            .do_nothing()
            .execute(&mut conn)?;

        let row = user_profiles::table
            .find(profile.id)
            .select(UserRecord::as_select())
            .first::<UserRecord>(&mut conn)?;
        UserProfile::try_from(row)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let mut conn = self.conn()?;
        user_profiles::table
            .find(id)
            .select(UserRecord::as_select())
            .first::<UserRecord>(&mut conn)
            .optional()?
            .map(UserProfile::try_from)
            .transpose()
    }

    async fn update_user(&self, profile: &UserProfile) -> AppResult<UserProfile> {
        let mut conn = self.conn()?;

        let updated = diesel::update(user_profiles::table.find(profile.id))
            .set(&UserChangeset::from(profile))
            .returning(UserRecord::as_returning())
            .get_result::<UserRecord>(&mut conn)
            .optional()
            .map_err(AppError::from);

        match updated {
            Ok(Some(row)) => UserProfile::try_from(row),
            Ok(None) => Err(user_not_found()),
            Err(e) if e.is_unique_violation() => Err(AppError::Validation(format!(
                "username {:?} is already taken",
                profile.username.as_deref().unwrap_or_default()
            ))),
            Err(e) => Err(e),
        }
    }

    async fn list_users(&self, params: &PaginationParams) -> AppResult<(Vec<UserProfile>, u64)> {
        let mut conn = self.conn()?;

        let rows = user_profiles::table
            .select(UserRecord::as_select())
            .order((user_profiles::created_at.desc(), user_profiles::id.desc()))
            .offset(sql_offset(params))
            .limit(sql_limit(params))
            .load::<UserRecord>(&mut conn)?;
        let total: i64 = user_profiles::table.count().get_result(&mut conn)?;

        let users = rows
            .into_iter()
            .map(UserProfile::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((users, total as u64))
    }
}

#[async_trait]
impl ListingRepository for PgStore {
    async fn insert_listing(&self, listing: &Listing) -> AppResult<Listing> {
        let mut conn = self.conn()?;

        let row = diesel::insert_into(listings::table)
            .values(&NewListingRecord::from(listing))
            .returning(ListingRecord::as_returning())
            .get_result::<ListingRecord>(&mut conn)
            .map_err(|e| {
                let err = AppError::from(e);
                if err.is_foreign_key_violation() {
                    user_not_found()
                } else {
                    err
                }
            })?;
        Listing::try_from(row)
    }

    async fn find_listing(&self, id: Uuid) -> AppResult<Option<Listing>> {
        let mut conn = self.conn()?;
        listings::table
            .find(id)
            .select(ListingRecord::as_select())
            .first::<ListingRecord>(&mut conn)
            .optional()?
            .map(Listing::try_from)
            .transpose()
    }

    async fn find_listing_with_owner(&self, id: Uuid) -> AppResult<Option<ListingWithOwner>> {
        let mut conn = self.conn()?;
        listings::table
            .inner_join(user_profiles::table)
            .filter(listings::id.eq(id))
            .select((ListingRecord::as_select(), OwnerSummary::as_select()))
            .first::<(ListingRecord, OwnerSummary)>(&mut conn)
            .optional()?
            .map(with_owner)
            .transpose()
    }

    async fn resubmit_listing(&self, listing: &Listing) -> AppResult<Listing> {
        let mut conn = self.conn()?;
        let row = diesel::update(
            listings::table
                .find(listing.id)
                .filter(listings::is_active.eq(true)),
        )
        .set(&ListingContentChangeset::from(listing))
        .returning(ListingRecord::as_returning())
        .get_result::<ListingRecord>(&mut conn)
        .optional()?
        .ok_or_else(listing_not_found)?;
        Listing::try_from(row)
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> AppResult<Listing> {
        let mut conn = self.conn()?;
        let row = diesel::update(listings::table.find(id).filter(listings::is_active.eq(true)))
            .set((
                listings::is_available.eq(available),
                listings::updated_at.eq(Utc::now()),
            ))
            .returning(ListingRecord::as_returning())
            .get_result::<ListingRecord>(&mut conn)
            .optional()?
            .ok_or_else(listing_not_found)?;
        Listing::try_from(row)
    }

    async fn query_listings(&self, query: &ListingQuery) -> AppResult<Vec<ListingWithOwner>> {
        let mut conn = self.conn()?;

        let mut q = listings::table
            .inner_join(user_profiles::table)
            .select((ListingRecord::as_select(), OwnerSummary::as_select()))
            .into_boxed();

        q = match query.scope {
            ListingScope::Browse => q
                .filter(listings::is_active.eq(true))
                .filter(listings::is_available.eq(true)),
            ListingScope::Owner(owner_id) => q.filter(listings::owner_id.eq(owner_id)),
            ListingScope::PendingReview => q
                .filter(listings::is_active.eq(true))
                .filter(listings::is_verified.eq(false))
                .filter(listings::rejection_reason.is_null()),
            ListingScope::All => q,
        };

        let f = &query.filter;
        if let Some(t) = f.listing_type {
            q = q.filter(listings::listing_type.eq(t.as_str()));
        }
        if let Some(city) = f.city.as_deref() {
            q = q.filter(listings::city.eq(city.to_string()));
        }
        if let Some(g) = f.gender {
            q = q.filter(listings::gender.eq(g.as_str()));
        }
        if let Some(food) = f.food_type {
            q = q.filter(listings::food_type.eq(food.as_str()));
        }
        if let Some(category) = f.category.as_deref() {
            q = q.filter(listings::category.eq(category.to_string()));
        }
        if let Some(verified) = f.verified {
            q = q.filter(listings::is_verified.eq(verified));
        }
        q = match f.status {
            Some(ReviewState::Pending) => q
                .filter(listings::is_verified.eq(false))
                .filter(listings::rejection_reason.is_null()),
            Some(ReviewState::Verified) => q.filter(listings::is_verified.eq(true)),
            Some(ReviewState::Rejected) => q.filter(listings::rejection_reason.is_not_null()),
            None => q,
        };
        if let Some(min) = f.min_price {
            q = q.filter(listings::price.ge(min));
        }
        if let Some(max) = f.max_price {
            q = q.filter(listings::price.le(max));
        }

        q.order((listings::created_at.desc(), listings::id.desc()))
            .load::<(ListingRecord, OwnerSummary)>(&mut conn)?
            .into_iter()
            .map(with_owner)
            .collect()
    }

    async fn increment_counter(&self, id: Uuid, counter: EngagementCounter) -> AppResult<()> {
        let mut conn = self.conn()?;
        let target = diesel::update(listings::table.find(id));

        let rows = match counter {
            EngagementCounter::Views => target
                .set(listings::view_count.eq(listings::view_count + 1))
                .execute(&mut conn)?,
            EngagementCounter::Contacts => target
                .set(listings::contact_count.eq(listings::contact_count + 1))
                .execute(&mut conn)?,
        };

        if rows == 0 {
            return Err(listing_not_found());
        }
        Ok(())
    }
}

#[async_trait]
impl SavedRepository for PgStore {
    async fn find_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<Option<SavedListing>> {
        let mut conn = self.conn()?;
        Ok(saved_listings::table
            .filter(saved_listings::user_id.eq(user_id))
            .filter(saved_listings::listing_id.eq(listing_id))
            .select(SavedListing::as_select())
            .first::<SavedListing>(&mut conn)
            .optional()?)
    }

    async fn insert_saved(&self, saved: &SavedListing) -> AppResult<SavedListing> {
        let mut conn = self.conn()?;
        diesel::insert_into(saved_listings::table)
            .values(saved)
            .returning(SavedListing::as_returning())
            .get_result::<SavedListing>(&mut conn)
            .map_err(|e| {
                let err = AppError::from(e);
                if err.is_unique_violation() {
                    AppError::new(ErrorCode::AlreadySaved, "listing is already saved")
                } else if err.is_foreign_key_violation() {
                    listing_not_found()
                } else {
                    err
                }
            })
    }

    async fn delete_saved(&self, user_id: Uuid, listing_id: Uuid) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let removed = diesel::delete(
            saved_listings::table
                .filter(saved_listings::user_id.eq(user_id))
                .filter(saved_listings::listing_id.eq(listing_id)),
        )
        .execute(&mut conn)?;
        Ok(removed > 0)
    }

    async fn list_saved(&self, user_id: Uuid) -> AppResult<Vec<SavedListingWithListing>> {
        let mut conn = self.conn()?;

        saved_listings::table
            .inner_join(listings::table.inner_join(user_profiles::table))
            .filter(saved_listings::user_id.eq(user_id))
            .select((
                SavedListing::as_select(),
                ListingRecord::as_select(),
                OwnerSummary::as_select(),
            ))
            .order((saved_listings::created_at.desc(), saved_listings::id.desc()))
            .load::<(SavedListing, ListingRecord, OwnerSummary)>(&mut conn)?
            .into_iter()
            .map(|(saved, row, owner)| {
                Ok(SavedListingWithListing {
                    saved,
                    listing: with_owner((row, owner))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModerationRepository for PgStore {
    async fn commit_review(
        &self,
        listing_id: Uuid,
        status: &ReviewStatus,
        action: NewAdminAction,
    ) -> AppResult<Listing> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        let (is_verified, rejection_reason) = status.to_columns();

        conn.transaction::<_, AppError, _>(|conn| {
            insert_action(conn, action)?;
            let row = diesel::update(listings::table.find(listing_id))
                .set((
                    listings::is_verified.eq(is_verified),
                    listings::rejection_reason.eq(rejection_reason),
                    listings::updated_at.eq(Utc::now()),
                ))
                .returning(ListingRecord::as_returning())
                .get_result::<ListingRecord>(conn)
                .optional()?
                .ok_or_else(listing_not_found)?;
            Listing::try_from(row)
        })
    }

    async fn commit_deactivation(&self, listing_id: Uuid, action: NewAdminAction) -> AppResult<Listing> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, AppError, _>(|conn| {
            insert_action(conn, action)?;
            let row = diesel::update(listings::table.find(listing_id))
                .set((
                    listings::is_active.eq(false),
                    listings::updated_at.eq(Utc::now()),
                ))
                .returning(ListingRecord::as_returning())
                .get_result::<ListingRecord>(conn)
                .optional()?
                .ok_or_else(listing_not_found)?;
            Listing::try_from(row)
        })
    }

    async fn commit_block(
        &self,
        user_id: Uuid,
        blocked: bool,
        action: NewAdminAction,
    ) -> AppResult<UserProfile> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;

        conn.transaction::<_, AppError, _>(|conn| {
            insert_action(conn, action)?;
            let row = diesel::update(user_profiles::table.find(user_id))
                .set((
                    user_profiles::is_blocked.eq(blocked),
                    user_profiles::updated_at.eq(Utc::now()),
                ))
                .returning(UserRecord::as_returning())
                .get_result::<UserRecord>(conn)
                .optional()?
                .ok_or_else(user_not_found)?;
            UserProfile::try_from(row)
        })
    }

    async fn audit_log(&self, params: &PaginationParams) -> AppResult<(Vec<AdminAction>, u64)> {
        let mut conn = self.conn()?;

        let rows = admin_actions::table
            .select(AdminActionRecord::as_select())
            .order((admin_actions::created_at.desc(), admin_actions::id.desc()))
            .offset(sql_offset(params))
            .limit(sql_limit(params))
            .load::<AdminActionRecord>(&mut conn)?;
        let total: i64 = admin_actions::table.count().get_result(&mut conn)?;

        let actions = rows
            .into_iter()
            .map(AdminAction::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((actions, total as u64))
    }
}

#[async_trait]
impl StatsRepository for PgStore {
    async fn count_users(&self) -> AppResult<i64> {
        let mut conn = self.conn()?;
        Ok(user_profiles::table.count().get_result(&mut conn)?)
    }

    async fn count_listings(&self, count: StatsCount) -> AppResult<i64> {
        let mut conn = self.conn()?;
        let q = listings::table.into_boxed();

        let q = match count {
            StatsCount::All => q,
            StatsCount::Active => q
                .filter(listings::is_active.eq(true))
                .filter(listings::is_available.eq(true)),
            StatsCount::Pending => q
                .filter(listings::is_active.eq(true))
                .filter(listings::is_verified.eq(false))
                .filter(listings::rejection_reason.is_null()),
            StatsCount::Verified => q.filter(listings::is_verified.eq(true)),
            StatsCount::OfType(t) => q.filter(listings::listing_type.eq(t.as_str())),
        };

        Ok(q.count().get_result(&mut conn)?)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}
