use std::sync::Arc;

use anyhow::{Context, Result};
use idcheck_core::ocr::TesseractOcr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod face_client;
mod narrator;
mod pipeline;
mod routes;
mod uploads;

use config::Config;
use face_client::DeepFaceClient;
use narrator::OpenAiNarrator;
use pipeline::Pipeline;
use routes::{app_router, AppState};
use uploads::UploadStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("idcheckd starting");

    let config = Config::from_env().context("failed to load configuration")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    let engine = engine::spawn_engine(config.thresholds.clone(), config.engine_queue)?;

    let face = DeepFaceClient::new(
        &config.face_service_url,
        &config.face_model,
        &config.face_detector,
        config.face_timeout,
    )
    .context("failed to build face service client")?;

    let ocr = TesseractOcr::new(&config.tesseract_bin, &config.ocr_language)
        .with_tessdata_dir(config.tessdata_dir.clone());

    let narrator = OpenAiNarrator::new(
        config.llm_api_key.clone(),
        &config.llm_base_url,
        &config.llm_model,
        config.llm_max_tokens,
        config.llm_timeout,
    )
    .context("failed to build LLM client")?;
    if !narrator.is_configured() {
        tracing::warn!("OPENAI_API_KEY not set, reports will use the fallback template");
    }

    tracing::info!(
        face_service = %config.face_service_url,
        face_model = %config.face_model,
        ocr_language = %config.ocr_language,
        llm_model = %config.llm_model,
        upload_dir = %config.upload_dir.display(),
        "services configured"
    );

    let pipeline = Pipeline::new(
        engine,
        Arc::new(face),
        Arc::new(ocr),
        Arc::new(narrator),
        config.thresholds.clone(),
    );
    let state = Arc::new(AppState {
        pipeline,
        uploads: UploadStore::new(&config.upload_dir),
    });
    let app = app_router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "idcheckd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("idcheckd shutting down");
    Ok(())
}
