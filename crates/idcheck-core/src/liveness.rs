//! Single-image liveness heuristic via edge density.
//!
//! A photo of a printed photo or a screen tends to carry moiré, paper grain
//! and bezel edges that a direct selfie does not. The heuristic runs a Canny
//! edge detector over the grayscale selfie and sums the edge-map intensities
//! (0 or 255 per pixel) over the pixel count. A density below the configured
//! threshold is judged live.
//!
//! # Threat Coverage
//!
//! - **Flags:** heavily textured recaptures (screens, halftone prints).
//! - **Does not flag:** clean recaptures, video replay, masks. The threshold
//!   is uncalibrated; treat the result as a weak signal.

use image::GrayImage;
use imageproc::edges::canny;

use crate::thresholds::Thresholds;
use crate::types::LivenessResult;

/// Sum of Canny edge-map intensities divided by pixel count.
pub fn edge_density(gray: &GrayImage, low: f32, high: f32) -> f64 {
    let pixels = (gray.width() as u64) * (gray.height() as u64);
    if pixels == 0 {
        return 0.0;
    }

    let edges = canny(gray, low, high);
    let total: u64 = edges.pixels().map(|p| p.0[0] as u64).sum();
    total as f64 / pixels as f64
}

/// Check whether a selfie passes the edge-density liveness heuristic.
pub fn check_edge_density(gray: &GrayImage, thresholds: &Thresholds) -> LivenessResult {
    let density = edge_density(gray, thresholds.canny_low, thresholds.canny_high);
    let is_live = density < thresholds.liveness_edge_density;

    tracing::debug!(
        edge_density = density,
        threshold = thresholds.liveness_edge_density,
        is_live,
        "liveness: edge density computed"
    );

    LivenessResult {
        is_live,
        edge_density: density,
    }
}
