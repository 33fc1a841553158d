use std::path::PathBuf;
use std::time::Duration;

use idcheck_core::thresholds::{Thresholds, ThresholdsError};

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Root directory for per-request upload slots.
    pub upload_dir: PathBuf,
    /// Maximum accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Capacity of the analysis engine request queue.
    pub engine_queue: usize,
    /// Base URL of the DeepFace-compatible face service.
    pub face_service_url: String,
    /// Recognition model requested from the face service.
    pub face_model: String,
    /// Detector backend requested from the face service.
    pub face_detector: String,
    pub face_timeout: Duration,
    /// Path or name of the tesseract binary.
    pub tesseract_bin: PathBuf,
    /// Tesseract trained-data language.
    pub ocr_language: String,
    pub tessdata_dir: Option<PathBuf>,
    /// LLM API key; `None` disables the LLM and every report uses the fallback.
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_timeout: Duration,
    pub thresholds: Thresholds,
}

impl Config {
    /// Load configuration from `IDCHECK_*` environment variables with defaults.
    ///
    /// Fails only when `IDCHECK_THRESHOLDS_FILE` names an unreadable or
    /// malformed file.
    pub fn from_env() -> Result<Self, ThresholdsError> {
        let thresholds = match std::env::var("IDCHECK_THRESHOLDS_FILE") {
            Ok(path) => Thresholds::load(std::path::Path::new(&path))?,
            Err(_) => Thresholds::default(),
        };

        Ok(Self {
            bind_addr: env_string("IDCHECK_BIND_ADDR", "127.0.0.1:5000"),
            upload_dir: PathBuf::from(env_string("IDCHECK_UPLOAD_DIR", "uploads")),
            max_upload_bytes: env_usize("IDCHECK_MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
            engine_queue: env_usize("IDCHECK_ENGINE_QUEUE", 8).max(1),
            face_service_url: env_string("IDCHECK_FACE_SERVICE_URL", "http://127.0.0.1:5005"),
            face_model: env_string("IDCHECK_FACE_MODEL", "VGG-Face"),
            face_detector: env_string("IDCHECK_FACE_DETECTOR", "opencv"),
            face_timeout: Duration::from_secs(env_u64("IDCHECK_FACE_TIMEOUT_SECS", 30)),
            tesseract_bin: PathBuf::from(env_string("IDCHECK_TESSERACT_BIN", "tesseract")),
            ocr_language: env_string("IDCHECK_OCR_LANG", "por"),
            tessdata_dir: std::env::var("TESSDATA_PREFIX").ok().map(PathBuf::from),
            llm_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            llm_base_url: env_string("IDCHECK_LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_model: env_string("IDCHECK_LLM_MODEL", "gpt-4"),
            llm_max_tokens: env_u32("IDCHECK_LLM_MAX_TOKENS", 700),
            llm_timeout: Duration::from_secs(env_u64("IDCHECK_LLM_TIMEOUT_SECS", 30)),
            thresholds,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
