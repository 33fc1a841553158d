//! Identity document analysis: image quality, OCR preprocessing, field
//! extraction and validity scoring.
//!
//! The CPU-bound half ([`prepare_document`]) is separate from the OCR half
//! ([`recognize_prepared`]) so callers can run them on different executors.

use std::path::Path;

use image::GrayImage;
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::median_filter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fields::DocumentFields;
use crate::quality::{laplacian_variance, lighting, open_gray, QualityError};
use crate::services::OcrEngine;
use crate::thresholds::Thresholds;
use crate::validation::{validate_document, DocumentValidation};

/// Half-size of the adaptive threshold neighbourhood (11x11 block).
const ADAPTIVE_BLOCK_RADIUS: u32 = 5;
/// Median filter radius (3x3 window).
const DENOISE_RADIUS: u32 = 1;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("could not load document image: {0}")]
    Load(#[from] QualityError),
    #[error("failed to write OCR input {path}: {source}")]
    Scratch {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("OCR failed: {0}")]
    Ocr(#[from] crate::services::OcrError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentQuality {
    pub brightness: f64,
    pub contrast: f64,
    /// Laplacian variance.
    pub blur_score: f64,
    pub is_blurry: bool,
    /// Pixel count.
    pub resolution: u64,
    pub width: u32,
    pub height: u32,
    pub is_good_quality: bool,
}

/// Judge document quality from precomputed statistics.
pub fn assess_quality(
    brightness: f64,
    contrast: f64,
    blur_score: f64,
    width: u32,
    height: u32,
    thresholds: &Thresholds,
) -> DocumentQuality {
    let is_blurry = blur_score < thresholds.blur_variance;
    DocumentQuality {
        brightness,
        contrast,
        blur_score,
        is_blurry,
        resolution: width as u64 * height as u64,
        width,
        height,
        is_good_quality: !is_blurry
            && brightness > thresholds.min_brightness
            && contrast > thresholds.min_contrast,
    }
}

pub fn measure_quality(gray: &GrayImage, thresholds: &Thresholds) -> DocumentQuality {
    let metrics = lighting(gray);
    assess_quality(
        metrics.brightness,
        metrics.contrast,
        laplacian_variance(gray),
        gray.width(),
        gray.height(),
        thresholds,
    )
}

/// Binarize with a local-mean adaptive threshold, then median-denoise.
pub fn preprocess_for_ocr(gray: &GrayImage) -> GrayImage {
    let binary = adaptive_threshold(gray, ADAPTIVE_BLOCK_RADIUS);
    median_filter(&binary, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// A decoded document ready for OCR.
pub struct PreparedDocument {
    pub quality: DocumentQuality,
    pub ocr_input: GrayImage,
}

/// Decode, measure and preprocess a document image.
pub fn prepare_document(path: &Path, thresholds: &Thresholds) -> Result<PreparedDocument, DocumentError> {
    let gray = open_gray(path)?;
    let quality = measure_quality(&gray, thresholds);
    tracing::debug!(
        brightness = quality.brightness,
        contrast = quality.contrast,
        blur_score = quality.blur_score,
        width = quality.width,
        height = quality.height,
        "document: quality measured"
    );
    Ok(PreparedDocument {
        quality,
        ocr_input: preprocess_for_ocr(&gray),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub success: bool,
    pub extracted_text: String,
    pub fields: DocumentFields,
    pub quality: DocumentQuality,
    pub validation: DocumentValidation,
    pub is_valid_document: bool,
}

impl DocumentReport {
    /// Extract fields from OCR text and score the document.
    pub fn from_text(text: String, quality: DocumentQuality, thresholds: &Thresholds) -> Self {
        let fields = DocumentFields::extract(&text);
        let validation = validate_document(&text, &fields, &quality, thresholds);
        Self {
            success: true,
            is_valid_document: validation.is_valid,
            extracted_text: text,
            fields,
            quality,
            validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub success: bool,
    pub error: String,
}

/// Outcome of document analysis. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentAnalysis {
    Completed(Box<DocumentReport>),
    Failed(DocumentFailure),
}

impl DocumentAnalysis {
    pub fn failed(error: impl std::fmt::Display) -> Self {
        DocumentAnalysis::Failed(DocumentFailure {
            success: false,
            error: error.to_string(),
        })
    }

    pub fn report(&self) -> Option<&DocumentReport> {
        match self {
            DocumentAnalysis::Completed(r) => Some(r),
            DocumentAnalysis::Failed(_) => None,
        }
    }

    /// False for failed analyses.
    pub fn is_valid(&self) -> bool {
        self.report().is_some_and(|r| r.validation.is_valid)
    }
}

/// Write the OCR input to `scratch`, run OCR on it and score the result.
pub async fn recognize_prepared<O: OcrEngine + ?Sized>(
    prepared: PreparedDocument,
    ocr: &O,
    scratch: &Path,
    thresholds: &Thresholds,
) -> DocumentAnalysis {
    match recognize_inner(prepared, ocr, scratch, thresholds).await {
        Ok(report) => DocumentAnalysis::Completed(Box::new(report)),
        Err(e) => {
            tracing::warn!(error = %e, "document: analysis failed");
            DocumentAnalysis::failed(e)
        }
    }
}

async fn recognize_inner<O: OcrEngine + ?Sized>(
    prepared: PreparedDocument,
    ocr: &O,
    scratch: &Path,
    thresholds: &Thresholds,
) -> Result<DocumentReport, DocumentError> {
    prepared
        .ocr_input
        .save_with_format(scratch, image::ImageFormat::Png)
        .map_err(|source| DocumentError::Scratch {
            path: scratch.display().to_string(),
            source,
        })?;

    let text = ocr.recognize(scratch).await?;
    tracing::debug!(chars = text.len(), "document: OCR text extracted");

    Ok(DocumentReport::from_text(text, prepared.quality, thresholds))
}

/// Run the whole document analysis on the current task.
pub async fn analyze_document<O: OcrEngine + ?Sized>(
    path: &Path,
    ocr: &O,
    scratch: &Path,
    thresholds: &Thresholds,
) -> DocumentAnalysis {
    match prepare_document(path, thresholds) {
        Ok(prepared) => recognize_prepared(prepared, ocr, scratch, thresholds).await,
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "document: could not prepare image");
            DocumentAnalysis::failed(e)
        }
    }
}
