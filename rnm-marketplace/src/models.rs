use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult};
use rnm_shared::types::auth::UserRole;

use crate::schema::{admin_actions, listings, saved_listings, user_profiles};

pub const MAX_PHOTOS: usize = 5;

// --- Listing facets ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingType {
    Room,
    Mess,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Room => "room",
            ListingType::Mess => "mess",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "room" => Some(ListingType::Room),
            "mess" => Some(ListingType::Mess),
            _ => None,
        }
    }

    /// Categories an owner may pick for this kind of listing.
    pub fn categories(&self) -> &'static [&'static str] {
        match self {
            ListingType::Room => &["single", "shared", "pg"],
            ListingType::Mess => &["veg", "nonveg", "both"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Boys,
    Girls,
    Unisex,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Boys => "boys",
            Gender::Girls => "girls",
            Gender::Unisex => "unisex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boys" => Some(Gender::Boys),
            "girls" => Some(Gender::Girls),
            "unisex" => Some(Gender::Unisex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodType {
    #[serde(rename = "veg")]
    Veg,
    #[serde(rename = "nonveg")]
    NonVeg,
    #[serde(rename = "both")]
    Both,
}

impl FoodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodType::Veg => "veg",
            FoodType::NonVeg => "nonveg",
            FoodType::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "veg" => Some(FoodType::Veg),
            "nonveg" => Some(FoodType::NonVeg),
            "both" => Some(FoodType::Both),
            _ => None,
        }
    }
}

// --- Review status ---

/// The three mutually exclusive review states, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Pending,
    Verified,
    Rejected,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Pending => "pending",
            ReviewState::Verified => "verified",
            ReviewState::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review status of a listing. A rejection always carries its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewStatus {
    Pending,
    Verified,
    Rejected { reason: String },
}

impl ReviewStatus {
    pub fn state(&self) -> ReviewState {
        match self {
            ReviewStatus::Pending => ReviewState::Pending,
            ReviewStatus::Verified => ReviewState::Verified,
            ReviewStatus::Rejected { .. } => ReviewState::Rejected,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, ReviewStatus::Verified)
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            ReviewStatus::Rejected { reason } => Some(reason),
            _ => None,
        }
    }

    /// Decodes the persisted `(is_verified, rejection_reason)` pair.
    ///
    /// `is_verified = true` together with a reason is not a state any
    /// transition produces, so it is reported instead of guessed at.
    pub fn from_columns(is_verified: bool, rejection_reason: Option<String>) -> Result<Self, String> {
        match (is_verified, rejection_reason) {
            (false, None) => Ok(ReviewStatus::Pending),
            (false, Some(reason)) => Ok(ReviewStatus::Rejected { reason }),
            (true, None) => Ok(ReviewStatus::Verified),
            (true, Some(reason)) => Err(format!(
                "listing is marked verified but carries rejection reason {reason:?}"
            )),
        }
    }

    pub fn to_columns(&self) -> (bool, Option<String>) {
        match self {
            ReviewStatus::Pending => (false, None),
            ReviewStatus::Verified => (true, None),
            ReviewStatus::Rejected { reason } => (false, Some(reason.clone())),
        }
    }
}

impl Serialize for ReviewStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("status", &self.state())?;
        map.serialize_entry("is_verified", &self.is_verified())?;
        map.serialize_entry("rejection_reason", &self.rejection_reason())?;
        map.end()
    }
}

// --- Listing ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub listing_type: ListingType,
    pub category: Option<String>,
    pub price: i32,
    pub deposit: i32,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub photos: Vec<String>,
    pub city: String,
    pub area: String,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<Gender>,
    pub food_type: Option<FoodType>,
    pub is_available: bool,
    pub is_active: bool,
    #[serde(flatten)]
    pub review: ReviewStatus,
    pub view_count: i32,
    pub contact_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Visible on the general browse surface.
    pub fn is_listed(&self) -> bool {
        self.is_active && self.is_available
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OwnerSummary {
    pub name: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingWithOwner {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner: Option<OwnerSummary>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ListingRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub listing_type: String,
    pub category: Option<String>,
    pub price: i32,
    pub deposit: i32,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub photos: Vec<String>,
    pub city: String,
    pub area: String,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<String>,
    pub food_type: Option<String>,
    pub is_available: bool,
    pub is_verified: bool,
    pub is_active: bool,
    pub rejection_reason: Option<String>,
    pub view_count: i32,
    pub contact_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRecord> for Listing {
    type Error = AppError;

    fn try_from(row: ListingRecord) -> AppResult<Self> {
        let corrupt = |what: &str| AppError::internal(format!("listing {} has {what}", row.id));

        let listing_type = ListingType::parse(&row.listing_type)
            .ok_or_else(|| corrupt(&format!("unknown type {:?}", row.listing_type)))?;
        let gender = match row.gender.as_deref() {
            Some(g) => Some(Gender::parse(g).ok_or_else(|| corrupt(&format!("unknown gender {g:?}")))?),
            None => None,
        };
        let food_type = match row.food_type.as_deref() {
            Some(f) => Some(FoodType::parse(f).ok_or_else(|| corrupt(&format!("unknown food type {f:?}")))?),
            None => None,
        };
        let review = ReviewStatus::from_columns(row.is_verified, row.rejection_reason.clone())
            .map_err(|e| corrupt(&e))?;

        Ok(Listing {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            listing_type,
            category: row.category,
            price: row.price,
            deposit: row.deposit,
            description: row.description,
            rules: row.rules,
            photos: row.photos,
            city: row.city,
            area: row.area,
            landmark: row.landmark,
            full_address: row.full_address,
            gender,
            food_type,
            is_available: row.is_available,
            is_active: row.is_active,
            review,
            view_count: row.view_count,
            contact_count: row.contact_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = listings)]
pub struct NewListingRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub listing_type: String,
    pub category: Option<String>,
    pub price: i32,
    pub deposit: i32,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub photos: Vec<String>,
    pub city: String,
    pub area: String,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<String>,
    pub food_type: Option<String>,
    pub is_available: bool,
    pub is_verified: bool,
    pub is_active: bool,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Listing> for NewListingRecord {
    fn from(listing: &Listing) -> Self {
        let (is_verified, rejection_reason) = listing.review.to_columns();
        Self {
            id: listing.id,
            owner_id: listing.owner_id,
            title: listing.title.clone(),
            listing_type: listing.listing_type.as_str().to_string(),
            category: listing.category.clone(),
            price: listing.price,
            deposit: listing.deposit,
            description: listing.description.clone(),
            rules: listing.rules.clone(),
            photos: listing.photos.clone(),
            city: listing.city.clone(),
            area: listing.area.clone(),
            landmark: listing.landmark.clone(),
            full_address: listing.full_address.clone(),
            gender: listing.gender.map(|g| g.as_str().to_string()),
            food_type: listing.food_type.map(|f| f.as_str().to_string()),
            is_available: listing.is_available,
            is_verified,
            is_active: listing.is_active,
            rejection_reason,
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

/// Owner-editable columns. Counters, ownership, type and `is_active`
/// are never written through this changeset.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = listings)]
#[diesel(treat_none_as_null = true)]
pub struct ListingContentChangeset {
    pub title: String,
    pub category: Option<String>,
    pub price: i32,
    pub deposit: i32,
    pub description: Option<String>,
    pub rules: Option<String>,
    pub photos: Vec<String>,
    pub city: String,
    pub area: String,
    pub landmark: Option<String>,
    pub full_address: Option<String>,
    pub gender: Option<String>,
    pub food_type: Option<String>,
    pub is_verified: bool,
    pub rejection_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Owner content plus the pending reset. Availability and the listing's
/// in-memory review status are never written from here.
impl From<&Listing> for ListingContentChangeset {
    fn from(listing: &Listing) -> Self {
        let (is_verified, rejection_reason) = ReviewStatus::Pending.to_columns();
        Self {
            title: listing.title.clone(),
            category: listing.category.clone(),
            price: listing.price,
            deposit: listing.deposit,
            description: listing.description.clone(),
            rules: listing.rules.clone(),
            photos: listing.photos.clone(),
            city: listing.city.clone(),
            area: listing.area.clone(),
            landmark: listing.landmark.clone(),
            full_address: listing.full_address.clone(),
            gender: listing.gender.map(|g| g.as_str().to_string()),
            food_type: listing.food_type.map(|f| f.as_str().to_string()),
            is_verified,
            rejection_reason,
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementCounter {
    Views,
    Contacts,
}

// --- User profile ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub phone: String,
    pub role: UserRole,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: Uuid, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            phone: phone.into(),
            role: UserRole::User,
            name: None,
            email: None,
            username: None,
            is_blocked: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = user_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRecord {
    pub id: Uuid,
    pub phone: String,
    pub role: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for UserProfile {
    type Error = AppError;

    fn try_from(row: UserRecord) -> AppResult<Self> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| AppError::internal(format!("user {} has {e}", row.id)))?;

        Ok(UserProfile {
            id: row.id,
            phone: row.phone,
            role,
            name: row.name,
            email: row.email,
            username: row.username,
            is_blocked: row.is_blocked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_profiles)]
pub struct NewUserRecord {
    pub id: Uuid,
    pub phone: String,
    pub role: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserProfile> for NewUserRecord {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            role: user.role.as_str().to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            is_blocked: user.is_blocked,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Self-service profile columns. `is_blocked` only changes through moderation.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = user_profiles)]
#[diesel(treat_none_as_null = true)]
pub struct UserChangeset {
    pub role: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserProfile> for UserChangeset {
    fn from(user: &UserProfile) -> Self {
        Self {
            role: user.role.as_str().to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            updated_at: user.updated_at,
        }
    }
}

// --- Saved listing ---

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = saved_listings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SavedListing {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedListingWithListing {
    #[serde(flatten)]
    pub saved: SavedListing,
    pub listing: ListingWithOwner,
}

// --- Admin action (audit log) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminActionType {
    Approve,
    Reject,
    DeleteListing,
    BlockUser,
    UnblockUser,
}

impl AdminActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminActionType::Approve => "approve",
            AdminActionType::Reject => "reject",
            AdminActionType::DeleteListing => "delete_listing",
            AdminActionType::BlockUser => "block_user",
            AdminActionType::UnblockUser => "unblock_user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(AdminActionType::Approve),
            "reject" => Some(AdminActionType::Reject),
            "delete_listing" => Some(AdminActionType::DeleteListing),
            "block_user" => Some(AdminActionType::BlockUser),
            "unblock_user" => Some(AdminActionType::UnblockUser),
            _ => None,
        }
    }

    pub fn target_type(&self) -> TargetType {
        match self {
            AdminActionType::Approve | AdminActionType::Reject | AdminActionType::DeleteListing => {
                TargetType::Listing
            }
            AdminActionType::BlockUser | AdminActionType::UnblockUser => TargetType::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Listing,
    User,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Listing => "listing",
            TargetType::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(TargetType::Listing),
            "user" => Some(TargetType::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminAction {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action_type: AdminActionType,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An audit entry waiting to be committed alongside its mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAdminAction {
    pub admin_id: Uuid,
    pub action_type: AdminActionType,
    pub target_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl NewAdminAction {
    pub fn new(admin_id: Uuid, action_type: AdminActionType, target_id: Uuid) -> Self {
        Self {
            admin_id,
            action_type,
            target_id,
            reason: None,
            metadata: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn into_action(self, id: Uuid, created_at: DateTime<Utc>) -> AdminAction {
        AdminAction {
            id,
            admin_id: self.admin_id,
            action_type: self.action_type,
            target_type: self.action_type.target_type(),
            target_id: self.target_id,
            reason: self.reason,
            metadata: self.metadata,
            created_at,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = admin_actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AdminActionRecord {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action_type: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdminActionRecord> for AdminAction {
    type Error = AppError;

    fn try_from(row: AdminActionRecord) -> AppResult<Self> {
        let action_type = AdminActionType::parse(&row.action_type).ok_or_else(|| {
            AppError::internal(format!("admin action {} has unknown type {:?}", row.id, row.action_type))
        })?;
        let target_type = TargetType::parse(&row.target_type).ok_or_else(|| {
            AppError::internal(format!("admin action {} has unknown target {:?}", row.id, row.target_type))
        })?;

        Ok(AdminAction {
            id: row.id,
            admin_id: row.admin_id,
            action_type,
            target_type,
            target_id: row.target_id,
            reason: row.reason,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = admin_actions)]
pub struct NewAdminActionRecord {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action_type: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<&AdminAction> for NewAdminActionRecord {
    fn from(action: &AdminAction) -> Self {
        Self {
            id: action.id,
            admin_id: action.admin_id,
            action_type: action.action_type.as_str().to_string(),
            target_type: action.target_type.as_str().to_string(),
            target_id: action.target_id,
            reason: action.reason.clone(),
            metadata: action.metadata.clone(),
            created_at: action.created_at,
        }
    }
}

// --- Dashboard ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_listings: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub verified_listings: i64,
    pub total_rooms: i64,
    pub total_mess: i64,
}
