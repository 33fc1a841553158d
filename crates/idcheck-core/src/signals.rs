//! Fail-closed wrappers turning face service calls into tamper signals.

use std::path::Path;

use crate::services::{FaceService, FaceServiceError};
use crate::types::{Detection, SimilarityScore};

/// Face-swap/edit check. An analysis the service declines counts as a
/// detection; an infrastructure failure is indeterminate.
pub async fn check_face_swap<S: FaceService + ?Sized>(service: &S, photo: &Path) -> Detection {
    match service.analyze(photo).await {
        Ok(()) => Detection::NotDetected,
        Err(FaceServiceError::Rejected(reason)) => {
            tracing::info!(%reason, "face swap: analysis rejected, flagging");
            Detection::Detected(reason)
        }
        Err(e) => {
            tracing::warn!(error = %e, "face swap: analysis unavailable, flagging");
            Detection::Indeterminate(e.to_string())
        }
    }
}

/// Crop/edit check: no detectable face means the selfie was cropped or edited.
pub async fn check_crop_or_edit<S: FaceService + ?Sized>(service: &S, photo: &Path) -> Detection {
    match service.count_faces(photo).await {
        Ok(0) => Detection::Detected("no face found in photo".to_string()),
        Ok(faces) => {
            tracing::debug!(faces, "crop check: faces found");
            Detection::NotDetected
        }
        Err(e) => {
            tracing::warn!(error = %e, "crop check: detector unavailable, flagging");
            Detection::Indeterminate(e.to_string())
        }
    }
}

/// Similarity between the selfie and the document photo.
pub async fn compare_faces<S: FaceService + ?Sized>(
    service: &S,
    photo: &Path,
    document: &Path,
) -> SimilarityScore {
    match service.verify(photo, document).await {
        Ok(v) => {
            tracing::debug!(distance = v.distance, similarity = v.similarity(), "faces compared");
            SimilarityScore::Score(v.similarity())
        }
        Err(e) => {
            tracing::warn!(error = %e, "face comparison failed");
            SimilarityScore::Unavailable(e.to_string())
        }
    }
}
