//! Verification report: the rule-based verdict, the LLM prompt and the
//! deterministic fallback narrative.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentAnalysis;
use crate::services::Narrator;
use crate::thresholds::Thresholds;
use crate::types::{FaceSignals, SimilarityScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => f.write_str("APPROVED"),
            Verdict::Rejected => f.write_str("REJECTED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Llm,
    Fallback,
}

/// Everything the report needs about one verification request.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub user_name: &'a str,
    pub document_type: &'a str,
    pub face: &'a FaceSignals,
    pub document: &'a DocumentAnalysis,
}

/// The five sub-conditions behind the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerdictChecks {
    pub no_face_swap: bool,
    pub no_crop_or_edit: bool,
    pub liveness: bool,
    pub similarity_ok: bool,
    pub document_valid: bool,
}

impl VerdictChecks {
    pub fn evaluate(input: &ReportInput<'_>, thresholds: &Thresholds) -> Self {
        Self {
            no_face_swap: !input.face.face_swap.is_flagged(),
            no_crop_or_edit: !input.face.crop_or_edit.is_flagged(),
            liveness: input.face.liveness.is_live,
            similarity_ok: input
                .face
                .similarity
                .value()
                .is_some_and(|v| v > thresholds.similarity),
            document_valid: input.document.is_valid(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.no_face_swap
            && self.no_crop_or_edit
            && self.liveness
            && self.similarity_ok
            && self.document_valid
        {
            Verdict::Approved
        } else {
            Verdict::Rejected
        }
    }
}

pub fn decide_verdict(input: &ReportInput<'_>, thresholds: &Thresholds) -> Verdict {
    VerdictChecks::evaluate(input, thresholds).verdict()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn similarity_text(score: &SimilarityScore) -> String {
    match score {
        SimilarityScore::Score(v) => format!("{v:.4}"),
        SimilarityScore::Unavailable(reason) => format!("unavailable ({reason})"),
    }
}

/// Prompt asking the LLM for a narrative and a verdict.
pub fn build_prompt(input: &ReportInput<'_>) -> String {
    let face = input.face;
    let mut p = String::new();

    let _ = writeln!(p, "Identity verification analysis");
    let _ = writeln!(p, "User: {}", input.user_name);
    let _ = writeln!(p, "Document type: {}", input.document_type);
    let _ = writeln!(p);
    let _ = writeln!(p, "Facial analysis:");
    let _ = writeln!(p, "- Face swap detected: {} ({})", yes_no(face.face_swap.is_flagged()), face.face_swap.label());
    let _ = writeln!(
        p,
        "- Cropped/edited image detected: {} ({})",
        yes_no(face.crop_or_edit.is_flagged()),
        face.crop_or_edit.label()
    );
    let _ = writeln!(p, "- Live selfie: {} (edge density {:.4})", yes_no(face.liveness.is_live), face.liveness.edge_density);
    let _ = writeln!(p, "- Selfie brightness: {:.2}", face.quality.brightness);
    let _ = writeln!(p, "- Selfie contrast: {:.2}", face.quality.contrast);
    let _ = writeln!(p, "- Face similarity (0-1): {}", similarity_text(&face.similarity));
    let _ = writeln!(p);

    let _ = writeln!(p, "Document analysis:");
    match input.document.report() {
        Some(doc) => {
            let _ = writeln!(p, "- Valid document: {}", yes_no(doc.validation.is_valid));
            let _ = writeln!(p, "- Confidence: {}%", doc.validation.confidence);
            let _ = writeln!(p, "- Good image quality: {}", yes_no(doc.quality.is_good_quality));
            let f = &doc.fields;
            for (label, value) in [
                ("CPF", &f.national_id),
                ("RG", &f.registry_number),
                ("Name", &f.name),
                ("Birth date", &f.birth_date),
                ("Issue date", &f.issue_date),
                ("Issuing authority", &f.issuing_authority),
            ] {
                let _ = writeln!(p, "- {label}: {}", value.as_deref().unwrap_or("not found"));
            }
            for issue in &doc.validation.issues {
                let _ = writeln!(p, "- Issue: {issue}");
            }
            for warning in &doc.validation.warnings {
                let _ = writeln!(p, "- Warning: {warning}");
            }
        }
        None => {
            let _ = writeln!(p, "- Document analysis failed");
        }
    }
    let _ = writeln!(p);
    let _ = writeln!(
        p,
        "Write a detailed report on these findings and conclude with a final \
         verdict of APPROVED or REJECTED."
    );
    p
}

/// Deterministic report used when the LLM is unavailable.
pub fn render_fallback(input: &ReportInput<'_>, thresholds: &Thresholds, generated_at: DateTime<Utc>) -> String {
    let face = input.face;
    let checks = VerdictChecks::evaluate(input, thresholds);
    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut r = String::new();

    let _ = writeln!(r, "IDENTITY VERIFICATION REPORT");
    let _ = writeln!(r, "User: {}", input.user_name);
    let _ = writeln!(r, "Document type: {}", input.document_type);
    let _ = writeln!(r, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(r);

    let _ = writeln!(r, "FACIAL ANALYSIS");
    let _ = writeln!(r, "- Face swap: {}", face.face_swap.label());
    let _ = writeln!(r, "- Crop/edit: {}", face.crop_or_edit.label());
    let _ = writeln!(r, "- Liveness: {}", if face.liveness.is_live { "live" } else { "not live" });
    let _ = writeln!(r, "- Brightness: {:.2}", face.quality.brightness);
    let _ = writeln!(r, "- Contrast: {:.2}", face.quality.contrast);
    let _ = writeln!(r, "- Face similarity: {}", similarity_text(&face.similarity));
    let _ = writeln!(r);

    if !checks.no_face_swap {
        issues.push("Possible face swap or manipulation".to_string());
    }
    if !checks.no_crop_or_edit {
        issues.push("Photo appears cropped or edited".to_string());
    }
    if !checks.liveness {
        issues.push("Selfie did not pass the liveness check".to_string());
    }
    if !checks.similarity_ok {
        issues.push(match face.similarity.value() {
            Some(_) => "Face similarity below the required level".to_string(),
            None => "Face similarity could not be computed".to_string(),
        });
    }

    let _ = writeln!(r, "DOCUMENT ANALYSIS");
    match input.document {
        DocumentAnalysis::Completed(doc) => {
            let _ = writeln!(r, "- Valid: {}", yes_no(doc.validation.is_valid));
            let _ = writeln!(r, "- Confidence: {}%", doc.validation.confidence);
            let _ = writeln!(r, "- Image quality: {}", if doc.quality.is_good_quality { "good" } else { "poor" });
            if let Some(name) = &doc.fields.name {
                let _ = writeln!(r, "- Name: {name}");
            }
            if let Some(id) = &doc.fields.national_id {
                let _ = writeln!(r, "- CPF: {id}");
            }
            if let Some(rg) = &doc.fields.registry_number {
                let _ = writeln!(r, "- RG: {rg}");
            }
            issues.extend(doc.validation.issues.iter().cloned());
            warnings.extend(doc.validation.warnings.iter().cloned());
            if !doc.validation.is_valid {
                issues.push("Document failed validation".to_string());
            }
        }
        DocumentAnalysis::Failed(failure) => {
            let _ = writeln!(r, "- Error: {}", failure.error);
            issues.push("Document could not be analyzed".to_string());
        }
    }
    let _ = writeln!(r);

    if !issues.is_empty() {
        let _ = writeln!(r, "ISSUES");
        for (i, issue) in issues.iter().enumerate() {
            let _ = writeln!(r, "{}. {issue}", i + 1);
        }
        let _ = writeln!(r);
    }
    if !warnings.is_empty() {
        let _ = writeln!(r, "WARNINGS");
        for (i, warning) in warnings.iter().enumerate() {
            let _ = writeln!(r, "{}. {warning}", i + 1);
        }
        let _ = writeln!(r);
    }

    let _ = write!(r, "FINAL VERDICT: {}", checks.verdict());
    r
}

/// A finished report and where its narrative came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub text: String,
    pub verdict: Verdict,
    pub source: ReportSource,
}

/// Ask the narrator for a report; fall back to the template on any failure.
pub async fn generate_report<N: Narrator + ?Sized>(
    narrator: &N,
    input: &ReportInput<'_>,
    thresholds: &Thresholds,
) -> GeneratedReport {
    let verdict = decide_verdict(input, thresholds);
    let prompt = build_prompt(input);

    match narrator.narrate(&prompt).await {
        Ok(text) => GeneratedReport {
            text,
            verdict,
            source: ReportSource::Llm,
        },
        Err(e) => {
            tracing::warn!(error = %e, "report: LLM unavailable, using fallback");
            GeneratedReport {
                text: render_fallback(input, thresholds, Utc::now()),
                verdict,
                source: ReportSource::Fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{assess_quality, DocumentReport};
    use crate::services::NarratorError;
    use crate::types::{Detection, LivenessResult, QualityMetrics};
    use async_trait::async_trait;
    use chrono::TimeZone;

    const VALID_TEXT: &str = "REPUBLICA FEDERATIVA DO BRASIL\n\
        CARTEIRA DE IDENTIDADE\n\
        NOME: MARIA DA SILVA\n\
        RG: 12.345.678-9\n\
        CPF 123.456.789-09\n\
        DATA NASC 01/02/1990\n";

    fn passing_face() -> FaceSignals {
        FaceSignals {
            face_swap: Detection::NotDetected,
            crop_or_edit: Detection::NotDetected,
            liveness: LivenessResult {
                is_live: true,
                edge_density: 0.0,
            },
            quality: QualityMetrics {
                brightness: 120.0,
                contrast: 45.0,
            },
            similarity: SimilarityScore::Score(0.91),
        }
    }

    fn valid_document() -> DocumentAnalysis {
        let quality = assess_quality(128.0, 60.0, 500.0, 800, 600, &Thresholds::default());
        DocumentAnalysis::Completed(Box::new(DocumentReport::from_text(
            VALID_TEXT.to_string(),
            quality,
            &Thresholds::default(),
        )))
    }

    fn verdict_for(face: &FaceSignals, document: &DocumentAnalysis) -> Verdict {
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face,
            document,
        };
        decide_verdict(&input, &Thresholds::default())
    }

    #[test]
    fn test_all_conditions_approve() {
        assert_eq!(verdict_for(&passing_face(), &valid_document()), Verdict::Approved);
    }

    #[test]
    fn test_face_swap_rejects() {
        let mut face = passing_face();
        face.face_swap = Detection::Detected("analysis refused".into());
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);

        face.face_swap = Detection::Indeterminate("timeout".into());
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);
    }

    #[test]
    fn test_crop_rejects() {
        let mut face = passing_face();
        face.crop_or_edit = Detection::Detected("no face".into());
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);
    }

    #[test]
    fn test_liveness_rejects() {
        let mut face = passing_face();
        face.liveness.is_live = false;
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);
    }

    #[test]
    fn test_similarity_boundary() {
        let mut face = passing_face();
        face.similarity = SimilarityScore::Score(0.69);
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);

        // strictly greater than 0.7
        face.similarity = SimilarityScore::Score(0.7);
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Rejected);

        face.similarity = SimilarityScore::Score(0.71);
        assert_eq!(verdict_for(&face, &valid_document()), Verdict::Approved);
    }

    #[test]
    fn test_non_numeric_similarity_rejects() {
        let mut face = passing_face();
        face.similarity = SimilarityScore::Unavailable("timeout error".into());
        let document = valid_document();
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let checks = VerdictChecks::evaluate(&input, &Thresholds::default());
        assert!(!checks.similarity_ok);
        assert_eq!(checks.verdict(), Verdict::Rejected);
    }

    #[test]
    fn test_invalid_document_rejects() {
        let quality = assess_quality(10.0, 5.0, 3.0, 800, 600, &Thresholds::default());
        let doc = DocumentAnalysis::Completed(Box::new(DocumentReport::from_text(
            String::new(),
            quality,
            &Thresholds::default(),
        )));
        assert_eq!(verdict_for(&passing_face(), &doc), Verdict::Rejected);
    }

    #[test]
    fn test_failed_document_rejects() {
        let doc = DocumentAnalysis::failed("could not load");
        assert_eq!(verdict_for(&passing_face(), &doc), Verdict::Rejected);
    }

    #[test]
    fn test_fallback_layout() {
        let face = passing_face();
        let document = DocumentAnalysis::failed("could not load document image");
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let report = render_fallback(&input, &Thresholds::default(), at);

        assert!(report.starts_with("IDENTITY VERIFICATION REPORT\nUser: Maria\nDocument type: RG\n"));
        assert!(report.contains("Generated: 2026-03-01 12:30:00 UTC"));
        assert!(report.contains("- Error: could not load document image"));
        assert!(report.contains("ISSUES\n1. Document could not be analyzed"));
        assert!(!report.contains("WARNINGS"));
        assert!(report.ends_with("FINAL VERDICT: REJECTED"));
    }

    #[test]
    fn test_fallback_approved() {
        let face = passing_face();
        let document = valid_document();
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let report = render_fallback(&input, &Thresholds::default(), Utc::now());
        assert!(!report.contains("ISSUES"));
        assert!(report.contains("- CPF: 123.456.789-09"));
        assert!(report.ends_with("FINAL VERDICT: APPROVED"));
    }

    #[test]
    fn test_prompt_mentions_signals() {
        let mut face = passing_face();
        face.similarity = SimilarityScore::Unavailable("timeout error".into());
        let document = valid_document();
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let prompt = build_prompt(&input);
        assert!(prompt.contains("User: Maria"));
        assert!(prompt.contains("Face similarity (0-1): unavailable (timeout error)"));
        assert!(prompt.contains("- CPF: 123.456.789-09"));
        assert!(prompt.contains("APPROVED or REJECTED"));
    }

    struct FailingNarrator;

    #[async_trait]
    impl Narrator for FailingNarrator {
        async fn narrate(&self, _prompt: &str) -> Result<String, NarratorError> {
            Err(NarratorError::Status {
                status: 429,
                body: "quota exceeded".into(),
            })
        }
    }

    struct EchoNarrator;

    #[async_trait]
    impl Narrator for EchoNarrator {
        async fn narrate(&self, prompt: &str) -> Result<String, NarratorError> {
            Ok(format!("narrated {} chars", prompt.len()))
        }
    }

    #[tokio::test]
    async fn test_generate_falls_back() {
        let face = passing_face();
        let document = valid_document();
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let report = generate_report(&FailingNarrator, &input, &Thresholds::default()).await;
        assert_eq!(report.source, ReportSource::Fallback);
        assert_eq!(report.verdict, Verdict::Approved);
        assert!(report.text.ends_with("FINAL VERDICT: APPROVED"));
    }

    #[tokio::test]
    async fn test_generate_uses_llm() {
        let face = passing_face();
        let document = valid_document();
        let input = ReportInput {
            user_name: "Maria",
            document_type: "RG",
            face: &face,
            document: &document,
        };
        let report = generate_report(&EchoNarrator, &input, &Thresholds::default()).await;
        assert_eq!(report.source, ReportSource::Llm);
        assert!(report.text.starts_with("narrated "));
    }
}
