pub mod admin;
pub mod health;
pub mod listings;
pub mod photos;
pub mod profile;
pub mod saved;

use rnm_shared::errors::AppResult;
use rnm_shared::types::auth::AuthUser;

use crate::policy::Actor;
use crate::services::users;
use crate::AppState;

/// Token claims only identify the caller; role and block state come from the store.
async fn actor(state: &AppState, user: &AuthUser) -> AppResult<Actor> {
    users::resolve_actor(state.store.as_ref(), user).await
}
