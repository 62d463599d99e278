use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::auth::{AuthUser, UserRole};

use crate::models::UserProfile;
use crate::policy::{Actor, Capability};
use crate::store::{Store, UserRepository};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1 to 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 3, max = 30, message = "username must be 3 to 30 characters"))]
    pub username: Option<String>,
}

impl UpdateProfileRequest {
    fn trimmed(self) -> Self {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            name: trim(self.name),
            email: trim(self.email).map(|e| e.to_lowercase()),
            username: trim(self.username),
        }
    }
}

/// Creates the profile for a newly registered identity. Replays are no-ops.
pub async fn ensure_profile(store: &dyn Store, user_id: Uuid, phone: &str) -> AppResult<UserProfile> {
    let profile = store.ensure_user(UserProfile::new(user_id, phone)).await?;
    tracing::debug!(user_id = %profile.id, role = %profile.role, "profile ensured");
    Ok(profile)
}

/// Resolves the caller's current role and blocked flag from the store.
pub async fn resolve_actor(store: &dyn Store, user: &AuthUser) -> AppResult<Actor> {
    store
        .find_user(user.id)
        .await?
        .map(|p| Actor::from(&p))
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "profile not found"))
}

pub async fn get_profile(store: &dyn Store, actor: &Actor) -> AppResult<UserProfile> {
    actor.require(Capability::ViewOwnProfile)?;
    load(store, actor.id).await
}

pub async fn update_profile(
    store: &dyn Store,
    actor: &Actor,
    req: UpdateProfileRequest,
) -> AppResult<UserProfile> {
    actor.require(Capability::EditOwnProfile)?;

    let req = req.trimmed();
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    if let Some(username) = req.username.as_deref() {
        if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "username may only contain letters, digits and underscores",
            ));
        }
    }

    let mut profile = load(store, actor.id).await?;
    if req.name.is_some() {
        profile.name = req.name;
    }
    if req.email.is_some() {
        profile.email = req.email;
    }
    if req.username.is_some() {
        profile.username = req.username;
    }
    profile.updated_at = Utc::now();

    store.update_user(&profile).await
}

/// Self-service `user -> owner`. No other role change is reachable here.
pub async fn upgrade_to_owner(store: &dyn Store, actor: &Actor) -> AppResult<UserProfile> {
    if actor.role != UserRole::User {
        return Err(AppError::new(
            ErrorCode::InvalidRoleTransition,
            format!("cannot upgrade from role {} to owner", actor.role),
        ));
    }
    actor.require(Capability::UpgradeToOwner)?;

    let mut profile = load(store, actor.id).await?;
    profile.role = UserRole::Owner;
    profile.updated_at = Utc::now();
    let profile = store.update_user(&profile).await?;

    tracing::info!(user_id = %profile.id, "user upgraded to owner");
    Ok(profile)
}

async fn load(store: &dyn Store, id: Uuid) -> AppResult<UserProfile> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "profile not found"))
}
