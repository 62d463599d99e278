use serde::Serialize;
use uuid::Uuid;

use rnm_shared::clients::rabbitmq::RabbitMQClient;
use rnm_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{Listing, UserProfile};

const SOURCE: &str = "rnm-marketplace";

/// Sends after the change is committed. A broker failure is logged and
/// never reaches the caller.
async fn publish<T: Serialize>(rabbitmq: Option<&RabbitMQClient>, event: Event<T>) {
    let Some(rabbitmq) = rabbitmq else {
        tracing::debug!(routing_key = %event.event_type, "events disabled, not published");
        return;
    };
    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, routing_key = %event.event_type, "failed to publish event");
    }
}

pub async fn publish_listing_submitted(rabbitmq: Option<&RabbitMQClient>, listing: &Listing) {
    let event = Event::new(
        SOURCE,
        routing_keys::LISTING_SUBMITTED,
        payloads::ListingSubmitted {
            listing_id: listing.id,
            owner_id: listing.owner_id,
            listing_type: listing.listing_type.as_str().to_string(),
            city: listing.city.clone(),
        },
    )
    .with_user(listing.owner_id);

    publish(rabbitmq, event).await;
}

async fn publish_listing_moderated(
    rabbitmq: Option<&RabbitMQClient>,
    routing_key: &str,
    listing: &Listing,
    admin_id: Uuid,
    reason: Option<String>,
) {
    let event = Event::new(
        SOURCE,
        routing_key,
        payloads::ListingModerated {
            listing_id: listing.id,
            owner_id: listing.owner_id,
            admin_id,
            reason,
        },
    )
    .with_user(admin_id);

    publish(rabbitmq, event).await;
}

pub async fn publish_listing_approved(rabbitmq: Option<&RabbitMQClient>, listing: &Listing, admin_id: Uuid) {
    publish_listing_moderated(rabbitmq, routing_keys::MODERATION_LISTING_APPROVED, listing, admin_id, None).await;
}

pub async fn publish_listing_rejected(rabbitmq: Option<&RabbitMQClient>, listing: &Listing, admin_id: Uuid) {
    let reason = listing.review.rejection_reason().map(str::to_string);
    publish_listing_moderated(rabbitmq, routing_keys::MODERATION_LISTING_REJECTED, listing, admin_id, reason).await;
}

pub async fn publish_listing_deleted(
    rabbitmq: Option<&RabbitMQClient>,
    listing: &Listing,
    admin_id: Uuid,
    reason: Option<String>,
) {
    publish_listing_moderated(rabbitmq, routing_keys::MODERATION_LISTING_DELETED, listing, admin_id, reason).await;
}

pub async fn publish_user_block_changed(
    rabbitmq: Option<&RabbitMQClient>,
    user: &UserProfile,
    admin_id: Uuid,
    reason: Option<String>,
) {
    let routing_key = if user.is_blocked {
        routing_keys::MODERATION_USER_BLOCKED
    } else {
        routing_keys::MODERATION_USER_UNBLOCKED
    };
    let event = Event::new(
        SOURCE,
        routing_key,
        payloads::UserBlockChanged {
            user_id: user.id,
            admin_id,
            is_blocked: user.is_blocked,
            reason,
        },
    )
    .with_user(admin_id);

    publish(rabbitmq, event).await;
}
