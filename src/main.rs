use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use image_gen_service::{ImageGenerator, ServiceConfig, routes, storage::GenerationStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(ServiceConfig::from_env()?);
    info!(?config, "Configuration loaded");

    let store = GenerationStore::connect(&config.database_path)
        .await
        .with_context(|| format!("open database {}", config.database_path.display()))?;
    let generator = Arc::new(ImageGenerator::new(config.clone(), store)?);
    let router = routes::router(generator);

    let tcp_listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("bind {}", config.bind_address))?;
    info!(
        "Image generation service started at http://{}/api/generate",
        config.bind_address
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
