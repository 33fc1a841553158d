use std::path::PathBuf;

use idcheck_core::document::{prepare_document, DocumentError, PreparedDocument};
use idcheck_core::liveness::check_edge_density;
use idcheck_core::quality::{lighting, open_gray, QualityError};
use idcheck_core::{LivenessResult, QualityMetrics, Thresholds};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("photo could not be analyzed: {0}")]
    Photo(#[from] QualityError),
    #[error("{0}")]
    Document(#[from] DocumentError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Locally computed selfie statistics.
#[derive(Debug, Clone, Copy)]
pub struct PhotoAnalysis {
    pub quality: QualityMetrics,
    pub liveness: LivenessResult,
}

/// Messages sent from request handlers to the engine thread.
enum EngineRequest {
    AnalyzePhoto {
        path: PathBuf,
        reply: oneshot::Sender<Result<PhotoAnalysis, EngineError>>,
    },
    PrepareDocument {
        path: PathBuf,
        reply: oneshot::Sender<Result<PreparedDocument, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode the selfie, measure lighting and run the liveness heuristic.
    pub async fn analyze_photo(&self, path: PathBuf) -> Result<PhotoAnalysis, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::AnalyzePhoto {
                path,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Decode the document, measure its quality and binarize it for OCR.
    pub async fn prepare_document(&self, path: PathBuf) -> Result<PreparedDocument, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::PrepareDocument {
                path,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the analysis engine on a dedicated OS thread.
///
/// All CPU-bound image work (decoding, statistics, edge and Laplacian
/// filters, OCR preprocessing) runs here so request tasks never block the
/// async runtime. The thread exits once every handle is dropped.
pub fn spawn_engine(thresholds: Thresholds, queue: usize) -> Result<EngineHandle, EngineError> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue);

    std::thread::Builder::new()
        .name("idcheck-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::AnalyzePhoto { path, reply } => {
                        let _ = reply.send(run_photo(&path, &thresholds));
                    }
                    EngineRequest::PrepareDocument { path, reply } => {
                        let result = prepare_document(&path, &thresholds).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_photo(path: &std::path::Path, thresholds: &Thresholds) -> Result<PhotoAnalysis, EngineError> {
    let gray = open_gray(path)?;
    let quality = lighting(&gray);
    let liveness = check_edge_density(&gray, thresholds);

    tracing::debug!(
        brightness = quality.brightness,
        contrast = quality.contrast,
        edge_density = liveness.edge_density,
        "photo: analyzed"
    );

    Ok(PhotoAnalysis { quality, liveness })
}
