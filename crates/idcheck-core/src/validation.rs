//! Additive validity score for an analyzed identity document.

use serde::{Deserialize, Serialize};

use crate::document::DocumentQuality;
use crate::fields::{count_nationality_keywords, DocumentFields};
use crate::thresholds::Thresholds;

const QUALITY_POINTS: u32 = 30;
const TEXT_POINTS: u32 = 20;
const NATIONAL_ID_POINTS: u32 = 15;
const REGISTRY_POINTS: u32 = 15;
const NAME_POINTS: u32 = 10;
const BIRTH_DATE_POINTS: u32 = 10;
const KEYWORD_POINTS: u32 = 10;
const MAX_SCORE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentValidation {
    pub is_valid: bool,
    /// Capped score, 0-100.
    pub confidence: u32,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Score a document from its OCR text, extracted fields and image quality.
pub fn validate_document(
    text: &str,
    fields: &DocumentFields,
    quality: &DocumentQuality,
    thresholds: &Thresholds,
) -> DocumentValidation {
    let mut score = 0u32;
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if quality.is_good_quality {
        score += QUALITY_POINTS;
    } else {
        issues.push("Poor image quality".to_string());
        if quality.is_blurry {
            issues.push("Image is blurry".to_string());
        }
        if quality.brightness < thresholds.min_brightness {
            issues.push("Image is too dark".to_string());
        }
        if quality.contrast < thresholds.min_contrast {
            issues.push("Insufficient contrast".to_string());
        }
    }

    if text.trim().chars().count() > thresholds.min_text_chars {
        score += TEXT_POINTS;
    } else {
        issues.push("Little or no text extracted".to_string());
    }

    let mut field = |present: bool, points: u32, missing: &str| {
        if present {
            score += points;
        } else {
            warnings.push(missing.to_string());
        }
    };
    field(fields.national_id.is_some(), NATIONAL_ID_POINTS, "National ID (CPF) not found");
    field(fields.registry_number.is_some(), REGISTRY_POINTS, "Registry number (RG) not found");
    field(fields.name.is_some(), NAME_POINTS, "Name not found");
    field(fields.birth_date.is_some(), BIRTH_DATE_POINTS, "Birth date not found");
    field(
        count_nationality_keywords(text) >= thresholds.nationality_keywords,
        KEYWORD_POINTS,
        "Document does not appear to be Brazilian",
    );

    let confidence = score.min(MAX_SCORE);
    DocumentValidation {
        is_valid: confidence >= thresholds.document_validity,
        confidence,
        issues,
        warnings,
    }
}
