//! OCR through the `tesseract` command-line engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::services::{OcrEngine, OcrError};

/// Runs `tesseract <image> stdout -l <language>` per request.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            tessdata_dir: None,
        }
    }

    pub fn with_tessdata_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.tessdata_dir = dir;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn command(&self, image: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image).arg("stdout").arg("-l").arg(&self.language);
        if let Some(dir) = &self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract", "por")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        let output = self.command(image).output().await.map_err(OcrError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
