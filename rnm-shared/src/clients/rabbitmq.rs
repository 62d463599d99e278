use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;

use crate::types::Event;

/// Topic exchange every RoomNMeal service publishes to.
pub const EXCHANGE: &str = "rnm.events";

/// Unacked deliveries a consumer holds at once.
const PREFETCH: u16 = 16;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker: {0}")]
    Amqp(#[from] lapin::Error),
    #[error("event encoding: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("broker refused event {0}")]
    Nacked(String),
}

/// Publisher-confirmed client bound to one service name. The name labels
/// the AMQP connection and prefixes every queue the service consumes.
#[derive(Clone)]
pub struct RabbitMQClient {
    channel: Channel,
    service: String,
}

impl RabbitMQClient {
    pub async fn connect(url: &str, service: &str) -> Result<Self, BrokerError> {
        let properties = ConnectionProperties::default().with_connection_name(service.into());
        let conn = Connection::connect(url, properties).await?;
        let channel = conn.create_channel().await?;

        channel
            .exchange_declare(
                EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel.confirm_select(ConfirmSelectOptions::default()).await?;

        tracing::info!(service, exchange = EXCHANGE, "connected to RabbitMQ");
        Ok(Self {
            channel,
            service: service.to_string(),
        })
    }

    /// Routes by `event.event_type` and waits for the broker's confirm.
    pub async fn publish<T: Serialize>(&self, event: &Event<T>) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(event)?;

        let confirm = self
            .channel
            .basic_publish(
                EXCHANGE,
                &event.event_type,
                BasicPublishOptions::default(),
                &payload,
                properties_for(event),
            )
            .await?
            .await?;
        if confirm.is_nack() {
            return Err(BrokerError::Nacked(event.id.to_string()));
        }

        tracing::debug!(routing_key = %event.event_type, event_id = %event.id, "event published");
        Ok(())
    }

    /// Durable queue `{service}.{key}` bound to one routing key.
    pub async fn consume(&self, routing_key: &str) -> Result<Consumer, BrokerError> {
        let queue = queue_name(&self.service, routing_key);

        self.channel
            .queue_declare(
                &queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(&queue, EXCHANGE, routing_key, QueueBindOptions::default(), FieldTable::default())
            .await?;
        self.channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await?;

        let consumer = self
            .channel
            .basic_consume(
                &queue,
                &format!("{}-consumer", self.service),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %queue, routing_key, "consuming");
        Ok(consumer)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.status().connected()
    }
}

/// `rnm.auth.user.registered` consumed by `rnm-marketplace` becomes
/// `rnm-marketplace.auth.user.registered`.
pub fn queue_name(service: &str, routing_key: &str) -> String {
    let key = routing_key.strip_prefix("rnm.").unwrap_or(routing_key);
    format!("{service}.{key}")
}

fn properties_for<T: Serialize>(event: &Event<T>) -> BasicProperties {
    BasicProperties::default()
        .with_content_type("application/json".into())
        .with_delivery_mode(2)
        .with_message_id(event.id.to_string().into())
        .with_app_id(event.source.clone().into())
        .with_timestamp(u64::try_from(event.timestamp.timestamp()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::{payloads, routing_keys};
    use uuid::Uuid;

    #[test]
    fn queues_are_prefixed_by_service() {
        assert_eq!(
            queue_name("rnm-marketplace", routing_keys::AUTH_USER_REGISTERED),
            "rnm-marketplace.auth.user.registered"
        );
        assert_eq!(queue_name("rnm-marketplace", "custom.key"), "rnm-marketplace.custom.key");
    }

    #[test]
    fn messages_are_persistent_and_traceable() {
        let event = Event::new(
            "rnm-marketplace",
            routing_keys::MODERATION_USER_BLOCKED,
            payloads::UserBlockChanged {
                user_id: Uuid::now_v7(),
                admin_id: Uuid::now_v7(),
                is_blocked: true,
                reason: Some("spam".into()),
            },
        );

        let props = properties_for(&event);
        assert_eq!(props.delivery_mode(), &Some(2));
        assert_eq!(
            props.message_id().as_ref().map(|id| id.as_str()),
            Some(event.id.to_string().as_str())
        );
        assert_eq!(props.app_id().as_ref().map(|a| a.as_str()), Some("rnm-marketplace"));
        assert_eq!(
            props.content_type().as_ref().map(|c| c.as_str()),
            Some("application/json")
        );
    }
}
