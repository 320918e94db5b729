use std::sync::Arc;

use llmxt::config::Config;
use llmxt::jobs::JobManager;
use llmxt::storage::{StorageClient, StorageConfig};
use llmxt::{build_app, AppState};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config =
        Arc::new(Config::from_env().expect("Failed to load configuration from environment"));
    let port = config.port;

    let storage = if config.use_object_storage {
        Some(Arc::new(StorageClient::new(StorageConfig {
            endpoint: config.storage_endpoint.clone(),
            access_key: config.storage_access_key.clone(),
            secret_key: config.storage_secret_key.clone(),
            bucket: config.storage_bucket.clone(),
            region: config.storage_region.clone(),
        })))
    } else {
        None
    };

    let job_manager = Arc::new(JobManager::new((*config).clone(), storage));

    let state = AppState {
        config: config.clone(),
        job_manager,
    };

    let app = build_app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("llm.txt generator service starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}
