//! Role gate: which capabilities each role carries, and which UI tabs follow
//! from them.
//!
//! Every route decides access through [`Actor::require`]; nothing else in the
//! crate compares roles directly.

use serde::Serialize;
use uuid::Uuid;

use rnm_shared::errors::{AppError, AppResult, ErrorCode};
use rnm_shared::types::auth::UserRole;

use crate::models::{Listing, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Browse,
    SaveListings,
    ViewOwnProfile,
    EditOwnProfile,
    UpgradeToOwner,
    CreateListing,
    EditOwnListing,
    ToggleOwnAvailability,
    UploadPhotos,
    ModerateListings,
    DeleteAnyListing,
    ManageUsers,
    ViewDashboard,
    ViewAuditLog,
}

impl Capability {
    /// Mutating capabilities are refused to blocked accounts.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Capability::Browse
                | Capability::ViewOwnProfile
                | Capability::ViewDashboard
                | Capability::ViewAuditLog
        )
    }
}

const USER_CAPABILITIES: &[Capability] = &[
    Capability::Browse,
    Capability::SaveListings,
    Capability::ViewOwnProfile,
    Capability::EditOwnProfile,
    Capability::UpgradeToOwner,
];

const OWNER_CAPABILITIES: &[Capability] = &[
    Capability::Browse,
    Capability::SaveListings,
    Capability::ViewOwnProfile,
    Capability::EditOwnProfile,
    Capability::CreateListing,
    Capability::EditOwnListing,
    Capability::ToggleOwnAvailability,
    Capability::UploadPhotos,
];

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::Browse,
    Capability::ViewOwnProfile,
    Capability::EditOwnProfile,
    Capability::ModerateListings,
    Capability::DeleteAnyListing,
    Capability::ManageUsers,
    Capability::ViewDashboard,
    Capability::ViewAuditLog,
];

pub fn capabilities(role: UserRole) -> &'static [Capability] {
    match role {
        UserRole::User => USER_CAPABILITIES,
        UserRole::Owner => OWNER_CAPABILITIES,
        UserRole::Admin => ADMIN_CAPABILITIES,
    }
}

pub fn allows(role: UserRole, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Dashboard,
    OwnerHome,
    Browse,
    Saved,
    Profile,
}

/// (tab, capability that shows it, capability that hides it)
const TAB_RULES: &[(Tab, Capability, Option<Capability>)] = &[
    (Tab::Dashboard, Capability::ViewDashboard, None),
    (Tab::OwnerHome, Capability::CreateListing, None),
    (Tab::Browse, Capability::Browse, Some(Capability::ViewDashboard)),
    (Tab::Saved, Capability::SaveListings, Some(Capability::CreateListing)),
    (Tab::Profile, Capability::ViewOwnProfile, None),
];

/// Navigation tabs for a role, in display order.
pub fn tabs_for(role: UserRole) -> Vec<Tab> {
    TAB_RULES
        .iter()
        .filter(|(_, shown_by, hidden_by)| {
            allows(role, *shown_by) && !hidden_by.is_some_and(|c| allows(role, c))
        })
        .map(|(tab, _, _)| *tab)
        .collect()
}

/// The caller as the store knows them, not as their token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
    pub is_blocked: bool,
}

impl From<&UserProfile> for Actor {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id,
            role: profile.role,
            is_blocked: profile.is_blocked,
        }
    }
}

impl Actor {
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.is_blocked && capability.is_mutating() {
            return Err(AppError::new(ErrorCode::UserBlocked, "your account has been blocked"));
        }
        if !allows(self.role, capability) {
            return Err(AppError::forbidden(format!(
                "role {} may not {}",
                self.role,
                describe(capability)
            )));
        }
        Ok(())
    }

    pub fn require_owner(&self, listing: &Listing) -> AppResult<()> {
        if listing.owner_id != self.id {
            return Err(AppError::new(
                ErrorCode::NotListingOwner,
                "you do not own this listing",
            ));
        }
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

fn describe(capability: Capability) -> &'static str {
    match capability {
        Capability::Browse => "browse listings",
        Capability::SaveListings => "save listings",
        Capability::ViewOwnProfile => "view a profile",
        Capability::EditOwnProfile => "edit a profile",
        Capability::UpgradeToOwner => "upgrade to owner",
        Capability::CreateListing => "create listings",
        Capability::EditOwnListing => "edit listings",
        Capability::ToggleOwnAvailability => "change listing availability",
        Capability::UploadPhotos => "upload photos",
        Capability::ModerateListings => "moderate listings",
        Capability::DeleteAnyListing => "delete listings",
        Capability::ManageUsers => "manage users",
        Capability::ViewDashboard => "view the dashboard",
        Capability::ViewAuditLog => "view the audit log",
    }
}

/// Response body for `GET /me/capabilities`.
#[derive(Debug, Serialize)]
pub struct RoleView {
    pub role: UserRole,
    pub is_blocked: bool,
    pub capabilities: &'static [Capability],
    pub tabs: Vec<Tab>,
}

impl From<Actor> for RoleView {
    fn from(actor: Actor) -> Self {
        Self {
            role: actor.role,
            is_blocked: actor.is_blocked,
            capabilities: capabilities(actor.role),
            tabs: tabs_for(actor.role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: UserRole, is_blocked: bool) -> Actor {
        Actor {
            id: Uuid::now_v7(),
            role,
            is_blocked,
        }
    }

    #[test]
    fn tabs_follow_capabilities() {
        assert_eq!(tabs_for(UserRole::User), vec![Tab::Browse, Tab::Saved, Tab::Profile]);
        assert_eq!(tabs_for(UserRole::Owner), vec![Tab::OwnerHome, Tab::Browse, Tab::Profile]);
        assert_eq!(tabs_for(UserRole::Admin), vec![Tab::Dashboard, Tab::Profile]);
    }

    #[test]
    fn only_admins_moderate() {
        assert!(allows(UserRole::Admin, Capability::ModerateListings));
        assert!(!allows(UserRole::Owner, Capability::ModerateListings));
        assert!(!allows(UserRole::User, Capability::ModerateListings));
    }

    #[test]
    fn only_users_upgrade() {
        assert!(allows(UserRole::User, Capability::UpgradeToOwner));
        assert!(!allows(UserRole::Owner, Capability::UpgradeToOwner));
        assert!(!allows(UserRole::Admin, Capability::UpgradeToOwner));
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let err = actor(UserRole::User, false)
            .require(Capability::CreateListing)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[test]
    fn blocked_actor_cannot_mutate_but_can_read() {
        let owner = actor(UserRole::Owner, true);
        assert_eq!(
            owner.require(Capability::CreateListing).unwrap_err().code(),
            ErrorCode::UserBlocked
        );
        assert!(owner.require(Capability::Browse).is_ok());
        assert!(owner.require(Capability::ViewOwnProfile).is_ok());
    }

    #[test]
    fn role_view_lists_tabs() {
        let view = RoleView::from(actor(UserRole::Owner, false));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["role"], "owner");
        assert_eq!(value["tabs"][0], "owner_home");
        assert!(value["capabilities"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("create_listing")));
    }
}
