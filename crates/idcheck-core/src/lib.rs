//! idcheck-core: analysis engine for selfie and identity document checks.
//!
//! Computes image statistics, the liveness heuristic and document validity
//! locally, and defines the seams to the external face service, OCR engine
//! and language model.

pub mod document;
pub mod fields;
pub mod liveness;
pub mod ocr;
pub mod quality;
pub mod report;
pub mod services;
pub mod signals;
pub mod thresholds;
pub mod types;
pub mod validation;

pub use document::{DocumentAnalysis, DocumentQuality, DocumentReport};
pub use fields::DocumentFields;
pub use report::{ReportSource, Verdict};
pub use services::{FaceService, Narrator, OcrEngine};
pub use thresholds::Thresholds;
pub use types::{Detection, FaceSignals, LivenessResult, QualityMetrics, SimilarityScore};
pub use validation::DocumentValidation;
