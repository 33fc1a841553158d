//! Traits for the external collaborators: face service, OCR engine, LLM.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceServiceError {
    /// The service answered but declined to analyze the image.
    #[error("face service rejected the image: {0}")]
    Rejected(String),
    #[error("face service unreachable: {0}")]
    Transport(String),
    #[error("unexpected face service response: {0}")]
    Protocol(String),
    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to start OCR engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("OCR engine failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("no LLM API key configured")]
    NotConfigured,
    #[error("LLM request failed: {0}")]
    Transport(String),
    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM returned an empty completion")]
    EmptyReply,
}

/// Face-verification result, pinned to a distance-reporting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceVerification {
    /// Cosine distance between the two face embeddings.
    pub distance: f64,
    /// Service-side decision threshold, when reported.
    pub threshold: Option<f64>,
    pub verified: Option<bool>,
}

impl FaceVerification {
    /// `1 - distance`, clamped to `[0, 1]`.
    pub fn similarity(&self) -> f64 {
        (1.0 - self.distance).clamp(0.0, 1.0)
    }
}

#[async_trait]
pub trait FaceService: Send + Sync {
    /// Run attribute analysis (emotion, age, gender) on the face in `image`.
    async fn analyze(&self, image: &Path) -> Result<(), FaceServiceError>;

    /// Count faces found in `image`.
    async fn count_faces(&self, image: &Path) -> Result<usize, FaceServiceError>;

    /// Compare the faces in two images.
    async fn verify(&self, first: &Path, second: &Path) -> Result<FaceVerification, FaceServiceError>;
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Extract raw text from the image at `image`.
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}

#[async_trait]
pub trait Narrator: Send + Sync {
    /// Ask the language model to narrate a verification report.
    async fn narrate(&self, prompt: &str) -> Result<String, NarratorError>;
}
