use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rnm_shared::clients::rabbitmq::RabbitMQClient;
use rnm_shared::types::auth::{JwtSecret, JwtSecretSource};

pub mod config;
pub mod events;
pub mod models;
pub mod policy;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

use config::AppConfig;
use services::photos::{PhotoStorage, MAX_PHOTO_BYTES};
use store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: AppConfig,
    /// `None` when events are disabled or the broker was unreachable at startup.
    pub rabbitmq: Option<RabbitMQClient>,
    pub photos: Arc<dyn PhotoStorage>,
    pub metrics_handle: Option<PrometheusHandle>,
    pub jwt: JwtSecret,
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> JwtSecret {
        self.jwt.clone()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/stats", get(routes::admin::get_stats))
        .route("/listings", get(routes::admin::list_listings))
        .route("/listings/pending", get(routes::admin::list_pending))
        .route("/listings/:id/approve", post(routes::admin::approve_listing))
        .route("/listings/:id/reject", post(routes::admin::reject_listing))
        .route("/listings/:id/delete", post(routes::admin::delete_listing))
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id/block", post(routes::admin::block_user))
        .route("/users/:id/unblock", post(routes::admin::unblock_user))
        .route("/audit-log", get(routes::admin::get_audit_log));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route(
            "/listings",
            get(routes::listings::browse).post(routes::listings::create_listing),
        )
        .route(
            "/listings/:id",
            get(routes::listings::get_listing).patch(routes::listings::update_listing),
        )
        .route("/listings/:id/availability", put(routes::listings::set_availability))
        .route("/listings/:id/view", post(routes::listings::record_view))
        .route("/listings/:id/contact", post(routes::listings::record_contact))
        .route("/my/listings", get(routes::listings::my_listings))
        .route(
            "/photos",
            post(routes::photos::upload_photo).layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 64 * 1024)),
        )
        .route(
            "/me",
            get(routes::profile::get_profile).patch(routes::profile::update_profile),
        )
        .route("/me/upgrade", post(routes::profile::upgrade))
        .route("/me/capabilities", get(routes::profile::capabilities))
        .route("/saved", get(routes::saved::list_saved))
        .route(
            "/saved/:listing_id",
            get(routes::saved::check_saved)
                .post(routes::saved::save_listing)
                .delete(routes::saved::unsave_listing),
        )
        .nest("/admin", admin_routes)
        .route_layer(axum::middleware::from_fn(rnm_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
