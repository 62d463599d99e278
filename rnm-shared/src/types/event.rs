use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `rnm.{domain}.{entity}.{action}`
/// Example: `rnm.moderation.listing.approved`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Identity provider
    pub const AUTH_USER_REGISTERED: &str = "rnm.auth.user.registered";

    // Listings
    pub const LISTING_SUBMITTED: &str = "rnm.listing.listing.submitted";

    // Moderation
    pub const MODERATION_LISTING_APPROVED: &str = "rnm.moderation.listing.approved";
    pub const MODERATION_LISTING_REJECTED: &str = "rnm.moderation.listing.rejected";
    pub const MODERATION_LISTING_DELETED: &str = "rnm.moderation.listing.deleted";
    pub const MODERATION_USER_BLOCKED: &str = "rnm.moderation.user.blocked";
    pub const MODERATION_USER_UNBLOCKED: &str = "rnm.moderation.user.unblocked";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserRegistered {
        pub user_id: Uuid,
        pub phone: String,
    }

    /// A listing entered the review queue, either new or edited.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ListingSubmitted {
        pub listing_id: Uuid,
        pub owner_id: Uuid,
        pub listing_type: String,
        pub city: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ListingModerated {
        pub listing_id: Uuid,
        pub owner_id: Uuid,
        pub admin_id: Uuid,
        pub reason: Option<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserBlockChanged {
        pub user_id: Uuid,
        pub admin_id: Uuid,
        pub is_blocked: bool,
        pub reason: Option<String>,
    }
}
