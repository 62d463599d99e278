use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use rnm_shared::clients::rabbitmq::RabbitMQClient;
use rnm_shared::types::event::{payloads, routing_keys, Event};

use crate::services::users;
use crate::store::Store;

/// Creates a profile for every identity the auth provider registers.
pub async fn listen_user_registered(store: Arc<dyn Store>, rabbitmq: RabbitMQClient) -> anyhow::Result<()> {
    let mut consumer = rabbitmq
        .consume(routing_keys::AUTH_USER_REGISTERED)
        .await?;

    tracing::info!("listening for auth.user.registered events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                handle_user_registered(store.as_ref(), &delivery.data).await;
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Undecodable or failing messages are logged and dropped.
pub async fn handle_user_registered(store: &dyn Store, body: &[u8]) {
    let event = match serde_json::from_slice::<Event<payloads::UserRegistered>>(body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "failed to deserialize user.registered event");
            return;
        }
    };

    let data = &event.data;
    tracing::info!(user_id = %data.user_id, "received user.registered event");

    if let Err(e) = users::ensure_profile(store, data.user_id, &data.phone).await {
        tracing::error!(error = %e, user_id = %data.user_id, "failed to create profile");
    }
}
