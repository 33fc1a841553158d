//! `idcheck photo` and `idcheck document`: run the local analyzers on a file.

use std::path::Path;

use anyhow::{bail, Context, Result};
use idcheck_core::document::analyze_document;
use idcheck_core::liveness::check_edge_density;
use idcheck_core::ocr::TesseractOcr;
use idcheck_core::quality::{lighting, open_gray};
use idcheck_core::{DocumentAnalysis, Thresholds};
use serde_json::json;

/// Print lighting statistics and the liveness result for a selfie.
pub fn photo(path: &Path, thresholds: &Thresholds) -> Result<()> {
    let gray = open_gray(path).with_context(|| format!("failed to load {}", path.display()))?;
    let quality = lighting(&gray);
    let liveness = check_edge_density(&gray, thresholds);

    let report = json!({
        "path": path.display().to_string(),
        "width": gray.width(),
        "height": gray.height(),
        "brightness": quality.brightness,
        "contrast": quality.contrast,
        "liveness_detected": liveness.is_live,
        "edge_density": liveness.edge_density,
        "edge_density_threshold": thresholds.liveness_edge_density,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Print the full document analysis. Fails when the analysis did.
pub fn document(path: &Path, ocr: &TesseractOcr, thresholds: &Thresholds) -> Result<()> {
    let scratch = tempfile::Builder::new()
        .prefix("idcheck-ocr-")
        .suffix(".png")
        .tempfile()
        .context("failed to create OCR scratch file")?;

    tracing::debug!(
        path = %path.display(),
        language = ocr.language(),
        scratch = %scratch.path().display(),
        "document: analyzing"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let analysis = runtime.block_on(analyze_document(path, ocr, scratch.path(), thresholds));

    println!("{}", serde_json::to_string_pretty(&analysis)?);

    if let DocumentAnalysis::Failed(failure) = &analysis {
        bail!("document analysis failed: {}", failure.error);
    }
    Ok(())
}
