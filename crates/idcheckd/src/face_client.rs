//! HTTP client for a DeepFace-compatible face service.
//!
//! Pinned contract (DeepFace REST API):
//! - `POST /analyze` → `200 {"results": [...]}` or `400 {"error": "..."}`
//! - `POST /represent` with `enforce_detection: false` → one result per face;
//!   a frame with no face comes back as a single result with
//!   `face_confidence` 0.
//! - `POST /verify` → `{"verified", "distance", "threshold", ...}`; there is
//!   no `similarity` field.
//!
//! Images travel as base64 data URIs in the `img`/`img1`/`img2` fields.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use idcheck_core::services::{FaceService, FaceServiceError, FaceVerification};
use serde_json::{json, Value};

const ANALYZE_ACTIONS: [&str; 3] = ["emotion", "age", "gender"];

#[derive(Clone)]
pub struct DeepFaceClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    detector: String,
}

impl DeepFaceClient {
    pub fn new(
        base_url: &str,
        model: &str,
        detector: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            detector: detector.to_string(),
        })
    }

    async fn post(&self, endpoint: &str, body: Value) -> Result<Value, FaceServiceError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FaceServiceError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FaceServiceError::Transport(e.to_string()))?;

        classify_response(status.as_u16(), &text)
    }
}

async fn data_uri(path: &Path) -> Result<String, FaceServiceError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| FaceServiceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let mime = image::guess_format(&bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(&bytes)))
}

/// Map an HTTP status and body onto the face service error model.
///
/// 4xx with an `error` body means the service looked at the image and
/// refused it; 5xx is an infrastructure failure.
fn classify_response(status: u16, body: &str) -> Result<Value, FaceServiceError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error_message = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()));

    match status {
        200..=299 => match (parsed, error_message) {
            (_, Some(err)) => Err(FaceServiceError::Rejected(err)),
            (Some(v), None) => Ok(v),
            (None, None) => Err(FaceServiceError::Protocol(format!(
                "non-JSON body: {}",
                truncate(body)
            ))),
        },
        400..=499 => Err(FaceServiceError::Rejected(
            error_message.unwrap_or_else(|| format!("status {status}: {}", truncate(body))),
        )),
        _ => Err(FaceServiceError::Transport(format!(
            "status {status}: {}",
            error_message.unwrap_or_else(|| truncate(body))
        ))),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

fn parse_face_count(v: &Value) -> Result<usize, FaceServiceError> {
    let results = v
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| FaceServiceError::Protocol("missing `results` array".into()))?;

    Ok(results
        .iter()
        .filter(|r| {
            r.get("face_confidence")
                .and_then(Value::as_f64)
                .is_some_and(|c| c > 0.0)
        })
        .count())
}

fn parse_verification(v: &Value) -> Result<FaceVerification, FaceServiceError> {
    let distance = v
        .get("distance")
        .and_then(Value::as_f64)
        .ok_or_else(|| FaceServiceError::Protocol("missing numeric `distance`".into()))?;

    Ok(FaceVerification {
        distance,
        threshold: v.get("threshold").and_then(Value::as_f64),
        verified: v.get("verified").and_then(Value::as_bool),
    })
}

#[async_trait]
impl FaceService for DeepFaceClient {
    async fn analyze(&self, image: &Path) -> Result<(), FaceServiceError> {
        let body = json!({
            "img": data_uri(image).await?,
            "actions": ANALYZE_ACTIONS,
            "detector_backend": self.detector,
        });
        let v = self.post("analyze", body).await?;
        match v.get("results").and_then(Value::as_array) {
            Some(results) if !results.is_empty() => Ok(()),
            Some(_) => Err(FaceServiceError::Rejected("analysis returned no faces".into())),
            None => Err(FaceServiceError::Protocol("missing `results` array".into())),
        }
    }

    async fn count_faces(&self, image: &Path) -> Result<usize, FaceServiceError> {
        let body = json!({
            "img": data_uri(image).await?,
            "model_name": self.model,
            "detector_backend": self.detector,
            "enforce_detection": false,
        });
        let v = self.post("represent", body).await?;
        parse_face_count(&v)
    }

    async fn verify(&self, first: &Path, second: &Path) -> Result<FaceVerification, FaceServiceError> {
        let body = json!({
            "img1": data_uri(first).await?,
            "img2": data_uri(second).await?,
            "model_name": self.model,
            "detector_backend": self.detector,
            "distance_metric": "cosine",
        });
        let v = self.post("verify", body).await?;
        parse_verification(&v)
    }
}
