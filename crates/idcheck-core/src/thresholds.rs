//! Decision thresholds used across the analysis pipeline.
//!
//! None of these values come from calibration data. They are working
//! placeholders until an evaluation set exists, and every one of them can be
//! overridden from a TOML file.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThresholdsError {
    #[error("failed to read thresholds file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid thresholds file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Laplacian variance below this marks a document image as blurry.
    /// Common OpenCV rule of thumb for document photos.
    pub blur_variance: f64,
    /// Document brightness must exceed this for good quality.
    pub min_brightness: f64,
    /// Document contrast must exceed this for good quality.
    pub min_contrast: f64,
    /// Selfie edge density below this is judged live.
    pub liveness_edge_density: f64,
    /// Face similarity must exceed this for approval.
    pub similarity: f64,
    /// Minimum document validity score (0-100) for a valid document.
    pub document_validity: u32,
    /// Trimmed OCR text must be longer than this to score.
    pub min_text_chars: usize,
    /// Minimum number of nationality keywords present in the OCR text.
    pub nationality_keywords: usize,
    /// Canny hysteresis thresholds for the liveness edge map.
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            blur_variance: 100.0,
            min_brightness: 50.0,
            min_contrast: 20.0,
            liveness_edge_density: 0.02,
            similarity: 0.7,
            document_validity: 50,
            min_text_chars: 50,
            nationality_keywords: 2,
            canny_low: 100.0,
            canny_high: 200.0,
        }
    }
}

impl Thresholds {
    pub fn from_toml_str(s: &str) -> Result<Self, ThresholdsError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ThresholdsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ThresholdsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}
