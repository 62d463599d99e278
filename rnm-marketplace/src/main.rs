use std::sync::Arc;

use rnm_shared::clients::db::create_pool;
use rnm_shared::clients::minio::MinioClient;
use rnm_shared::clients::rabbitmq::RabbitMQClient;
use rnm_shared::types::auth::JwtSecret;

use rnm_marketplace::config::{AppConfig, StorageBackend};
use rnm_marketplace::events::subscriber;
use rnm_marketplace::store::{MemoryStore, PgStore, Store};
use rnm_marketplace::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rnm_shared::middleware::init_tracing("rnm-marketplace");

    let config = AppConfig::load()?;
    let port = config.port;

    let metrics_handle = match rnm_shared::middleware::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics exporter not installed");
            None
        }
    };

    let store: Arc<dyn Store> = match config.storage {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let rabbitmq = if config.events_enabled() {
        match RabbitMQClient::connect(&config.rabbitmq_url, "rnm-marketplace").await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "RabbitMQ unavailable, events disabled");
                None
            }
        }
    } else {
        tracing::info!("events disabled");
        None
    };

    let minio = MinioClient::new(
        &config.minio_endpoint,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.minio_bucket,
        &config.minio_public_url,
    )
    .await;

    if let Some(client) = rabbitmq.clone() {
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = subscriber::listen_user_registered(store, client).await {
                tracing::error!(error = %e, "user.registered subscriber stopped");
            }
        });
    }

    let jwt = JwtSecret::new(&config.jwt_secret);
    let state = Arc::new(AppState {
        store,
        config,
        rabbitmq,
        photos: Arc::new(minio),
        metrics_handle,
        jwt,
    });

    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "rnm-marketplace starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
