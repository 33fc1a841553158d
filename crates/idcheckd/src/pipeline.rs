use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use idcheck_core::document::recognize_prepared;
use idcheck_core::report::{generate_report, ReportInput, ReportSource, Verdict};
use idcheck_core::signals::{check_crop_or_edit, check_face_swap, compare_faces};
use idcheck_core::{
    Detection, DocumentAnalysis, FaceService, FaceSignals, Narrator, OcrEngine, SimilarityScore,
    Thresholds,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::{EngineError, EngineHandle};
use crate::uploads::{UploadKind, UploadSlot};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("photo could not be decoded: {0}")]
    UndecodablePhoto(String),
    #[error("analysis engine failure: {0}")]
    Engine(EngineError),
}

/// JSON payload returned by `POST /verify`.
#[derive(Debug, Serialize)]
pub struct VerificationResponse {
    pub request_id: Uuid,
    pub report: String,
    pub verdict: Verdict,
    pub report_source: ReportSource,
    pub face_swap_detected: bool,
    pub face_swap_check: Detection,
    pub crop_or_edit_detected: bool,
    pub crop_check: Detection,
    pub brightness: f64,
    pub contrast: f64,
    pub liveness_detected: bool,
    pub edge_density: f64,
    pub similarity_score: SimilarityScore,
    pub document_analysis: DocumentAnalysis,
}

/// The verification pipeline and the collaborators it drives.
pub struct Pipeline {
    engine: EngineHandle,
    face: Arc<dyn FaceService>,
    ocr: Arc<dyn OcrEngine>,
    narrator: Arc<dyn Narrator>,
    thresholds: Thresholds,
}

impl Pipeline {
    pub fn new(
        engine: EngineHandle,
        face: Arc<dyn FaceService>,
        ocr: Arc<dyn OcrEngine>,
        narrator: Arc<dyn Narrator>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            engine,
            face,
            ocr,
            narrator,
            thresholds,
        }
    }

    /// Run every check against the uploads in `slot` and build the report.
    ///
    /// Only an undecodable selfie or a dead engine aborts the request; every
    /// other failure degrades into the signals themselves.
    pub async fn run(
        &self,
        slot: &UploadSlot,
        user_name: &str,
        document_type: &str,
    ) -> Result<VerificationResponse, PipelineError> {
        let started = Instant::now();
        let photo = slot.path(UploadKind::Photo);
        let document = slot.path(UploadKind::Document);

        let photo_analysis = match self.engine.analyze_photo(photo.clone()).await {
            Ok(a) => a,
            Err(EngineError::Photo(e)) => return Err(PipelineError::UndecodablePhoto(e.to_string())),
            Err(e) => return Err(PipelineError::Engine(e)),
        };

        let face = self.face.as_ref();
        let scratch = slot.ocr_input_path();
        let (face_swap, crop_or_edit, similarity, document_analysis) = tokio::join!(
            check_face_swap(face, &photo),
            check_crop_or_edit(face, &photo),
            compare_faces(face, &photo, &document),
            self.analyze_document(&document, &scratch),
        );

        let signals = FaceSignals {
            face_swap,
            crop_or_edit,
            liveness: photo_analysis.liveness,
            quality: photo_analysis.quality,
            similarity,
        };

        tracing::info!(
            request_id = %slot.id(),
            face_swap = signals.face_swap.label(),
            crop_or_edit = signals.crop_or_edit.label(),
            live = signals.liveness.is_live,
            similarity = ?signals.similarity.value(),
            document_valid = document_analysis.is_valid(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verify: analysis complete"
        );

        let input = ReportInput {
            user_name,
            document_type,
            face: &signals,
            document: &document_analysis,
        };
        let report = generate_report(self.narrator.as_ref(), &input, &self.thresholds).await;

        tracing::info!(
            request_id = %slot.id(),
            verdict = %report.verdict,
            source = ?report.source,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "verify: report generated"
        );

        Ok(VerificationResponse {
            request_id: slot.id(),
            report: report.text,
            verdict: report.verdict,
            report_source: report.source,
            face_swap_detected: signals.face_swap.is_flagged(),
            face_swap_check: signals.face_swap,
            crop_or_edit_detected: signals.crop_or_edit.is_flagged(),
            crop_check: signals.crop_or_edit,
            brightness: signals.quality.brightness,
            contrast: signals.quality.contrast,
            liveness_detected: signals.liveness.is_live,
            edge_density: signals.liveness.edge_density,
            similarity_score: signals.similarity,
            document_analysis,
        })
    }

    async fn analyze_document(&self, path: &Path, scratch: &Path) -> DocumentAnalysis {
        match self.engine.prepare_document(path.to_path_buf()).await {
            Ok(prepared) => {
                recognize_prepared(prepared, self.ocr.as_ref(), scratch, &self.thresholds).await
            }
            Err(e) => {
                tracing::warn!(error = %e, "document: could not prepare image");
                DocumentAnalysis::failed(e)
            }
        }
    }
}
