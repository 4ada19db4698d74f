use anyhow::Result;
use facegate_core::{
    FaceExtractor, FullFrameDetector, ImageCurator, ModelTrainer, Recognizer, RecognizerConfig,
};
use facegate_store::{FsConnector, MirrorClient};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod compare;
mod config;
mod engine;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = config::Config::from_env();
    std::fs::create_dir_all(&cfg.data_dir)?;

    let connector = Arc::new(FsConnector::new(&cfg.store_root)?);
    let client = MirrorClient::new(connector);
    tracing::info!(
        store_root = %cfg.store_root.display(),
        data_dir = %cfg.data_dir.display(),
        "mirror store ready"
    );

    let curator = ImageCurator::new(client.clone(), &cfg.data_dir);
    let trainer = ModelTrainer::new(
        client.clone(),
        FaceExtractor::new(Box::new(FullFrameDetector)),
        &cfg.data_dir,
    )
    .with_augmentation(cfg.augment);
    let recognizer = Recognizer::new(
        client,
        FaceExtractor::new(Box::new(FullFrameDetector)),
        RecognizerConfig {
            distance_threshold: cfg.distance_threshold,
            fallback_threshold: cfg.fallback_threshold,
        },
    );

    let engine = engine::spawn_engine(curator, trainer, recognizer, cfg.fallback.clone());
    let state = Arc::new(routes::AppState {
        engine,
        request_timeout: cfg.request_timeout,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!(addr = %cfg.listen_addr, "facegated listening");
    axum::serve(listener, routes::router(state)).await?;

    Ok(())
}
