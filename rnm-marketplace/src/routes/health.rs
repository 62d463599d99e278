use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use rnm_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::store::StatsRepository;
use crate::AppState;

/// Probes the store, the broker (when events are on) and photo storage.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let mut checks = Vec::with_capacity(3);

    checks.push(match state.store.ping().await {
        Ok(()) => HealthCheck::healthy("store"),
        Err(e) => HealthCheck::unhealthy("store", e.to_string()),
    });

    if state.config.events_enabled() {
        checks.push(match &state.rabbitmq {
            Some(client) if client.is_connected() => HealthCheck::healthy("rabbitmq"),
            Some(_) => HealthCheck {
                name: "rabbitmq".into(),
                status: HealthStatus::Degraded,
                message: Some("channel disconnected".into()),
            },
            None => HealthCheck {
                name: "rabbitmq".into(),
                status: HealthStatus::Degraded,
                message: Some("not connected, events are dropped".into()),
            },
        });
    }

    checks.push(match state.photos.ping().await {
        Ok(()) => HealthCheck::healthy("photos"),
        Err(e) => HealthCheck {
            name: "photos".into(),
            status: HealthStatus::Degraded,
            message: Some(e),
        },
    });

    let response = HealthResponse::healthy("rnm-marketplace", env!("CARGO_PKG_VERSION")).with_checks(checks);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics_handle {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
