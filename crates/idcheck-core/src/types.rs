use serde::{Deserialize, Serialize};

/// Outcome of a fail-closed check backed by an external collaborator.
///
/// `Indeterminate` keeps infrastructure failures apart from real detections
/// while still counting as a raised flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Detection {
    Detected(String),
    NotDetected,
    Indeterminate(String),
}

impl Detection {
    /// True for `Detected` and `Indeterminate`.
    pub fn is_flagged(&self) -> bool {
        !matches!(self, Detection::NotDetected)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Detection::Indeterminate(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Detection::Detected(_) => "detected",
            Detection::NotDetected => "not detected",
            Detection::Indeterminate(_) => "indeterminate",
        }
    }
}

/// Face similarity reported by the verification service, or the reason it
/// could not be computed.
///
/// Serializes as a bare JSON number or a bare JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimilarityScore {
    Score(f64),
    Unavailable(String),
}

impl SimilarityScore {
    /// The numeric score, if one was produced.
    pub fn value(&self) -> Option<f64> {
        match self {
            SimilarityScore::Score(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

/// Mean and population standard deviation of grayscale intensity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub brightness: f64,
    pub contrast: f64,
}

/// Edge-density liveness result for a selfie.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    /// Whether the image passed the heuristic (true = judged live).
    pub is_live: bool,
    /// Sum of edge-map intensities divided by pixel count.
    pub edge_density: f64,
}

/// Every signal computed about the selfie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSignals {
    pub face_swap: Detection,
    pub crop_or_edit: Detection,
    pub liveness: LivenessResult,
    pub quality: QualityMetrics,
    pub similarity: SimilarityScore,
}
