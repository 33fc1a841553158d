use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::pipeline::{Pipeline, PipelineError};
use crate::uploads::{StoredUpload, UploadError, UploadKind, UploadSlot, UploadStore};

const MISSING_PARAMETERS: &str = "Missing required parameters";
const UPLOAD_TOO_LARGE: &str = "Upload exceeds size limit";

/// Shared state accessible by HTTP handlers.
pub struct AppState {
    pub pipeline: Pipeline,
    pub uploads: UploadStore,
}

pub fn app_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/verify", post(verify))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Identity verification API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /": "service information",
            "POST /verify": "multipart form: photo (file), document (file), name, document_type",
        },
    }))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn missing_parameters() -> Response {
    error_response(StatusCode::BAD_REQUEST, MISSING_PARAMETERS)
}

/// Parts collected from the multipart body; any may be absent.
#[derive(Default)]
struct VerifyForm {
    photo: Option<Bytes>,
    document: Option<Bytes>,
    name: Option<String>,
    document_type: Option<String>,
}

struct CompleteForm {
    photo: Bytes,
    document: Bytes,
    name: String,
    document_type: String,
}

impl VerifyForm {
    async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "photo" => form.photo = Some(field.bytes().await?),
                "document" => form.document = Some(field.bytes().await?),
                "name" => form.name = Some(field.text().await?),
                "document_type" => form.document_type = Some(field.text().await?),
                other => tracing::debug!(field = other, "verify: ignoring unknown part"),
            }
        }
        Ok(form)
    }

    fn complete(self) -> Option<CompleteForm> {
        Some(CompleteForm {
            photo: self.photo?,
            document: self.document?,
            name: self.name?,
            document_type: self.document_type?,
        })
    }
}

async fn store(
    slot: &UploadSlot,
    form: &CompleteForm,
) -> Result<(StoredUpload, StoredUpload), UploadError> {
    let photo = slot.write(UploadKind::Photo, &form.photo).await?;
    let document = slot.write(UploadKind::Document, &form.document).await?;
    Ok((photo, document))
}

/// Verify a selfie against an identity document.
async fn verify(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "verify: body is not multipart");
            return missing_parameters();
        }
    };

    let form = match VerifyForm::read(multipart).await {
        Ok(form) => form,
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::warn!(error = %e, "verify: upload too large");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, UPLOAD_TOO_LARGE);
        }
        Err(e) => {
            tracing::warn!(error = %e, "verify: malformed multipart body");
            return missing_parameters();
        }
    };

    let Some(form) = form.complete() else {
        return missing_parameters();
    };

    // Slot directory lives until this handler returns.
    let slot = match state.uploads.open_slot().await {
        Ok(slot) => slot,
        Err(e) => {
            tracing::error!(error = %e, "verify: could not allocate upload slot");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store uploads");
        }
    };
    let (photo, document) = match store(&slot, &form).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!(request_id = %slot.id(), error = %e, "verify: could not store uploads");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store uploads");
        }
    };

    tracing::info!(
        request_id = %slot.id(),
        user = %form.name,
        document_type = %form.document_type,
        dir = %slot.dir().display(),
        photo_bytes = photo.size,
        photo_sha256 = %photo.sha256,
        document_bytes = document.size,
        document_sha256 = %document.sha256,
        "verify requested"
    );

    match state.pipeline.run(&slot, &form.name, &form.document_type).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(PipelineError::UndecodablePhoto(detail)) => {
            tracing::info!(request_id = %slot.id(), %detail, "verify: photo rejected");
            error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Photo could not be decoded: {detail}"),
            )
        }
        Err(e) => {
            tracing::error!(request_id = %slot.id(), error = %e, "verify failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use idcheck_core::services::{
        FaceService, FaceServiceError, FaceVerification, Narrator, NarratorError, OcrEngine,
        OcrError,
    };
    use idcheck_core::Thresholds;
    use image::{GrayImage, Luma};
    use tower::ServiceExt;

    use crate::engine::spawn_engine;

    const BOUNDARY: &str = "idcheck-test-boundary";

    const DOCUMENT_TEXT: &str = "REPUBLICA FEDERATIVA DO BRASIL\n\
        CARTEIRA DE IDENTIDADE\n\
        Nome: Maria da Silva\n\
        RG: 12.345.678-9\n\
        CPF 123.456.789-09\n\
        Data Nasc 01/02/1990\n";

    struct FakeFace {
        distance: Option<f64>,
    }

    #[async_trait]
    impl FaceService for FakeFace {
        async fn analyze(&self, _image: &Path) -> Result<(), FaceServiceError> {
            Ok(())
        }

        async fn count_faces(&self, _image: &Path) -> Result<usize, FaceServiceError> {
            Ok(1)
        }

        async fn verify(&self, _first: &Path, _second: &Path) -> Result<FaceVerification, FaceServiceError> {
            match self.distance {
                Some(distance) => Ok(FaceVerification {
                    distance,
                    threshold: Some(0.68),
                    verified: Some(true),
                }),
                None => Err(FaceServiceError::Transport("timeout error".into())),
            }
        }
    }

    struct FakeOcr;

    #[async_trait]
    impl OcrEngine for FakeOcr {
        async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
            assert!(image.exists());
            Ok(DOCUMENT_TEXT.to_string())
        }
    }

    struct OfflineNarrator;

    #[async_trait]
    impl Narrator for OfflineNarrator {
        async fn narrate(&self, _prompt: &str) -> Result<String, NarratorError> {
            Err(NarratorError::NotConfigured)
        }
    }

    fn app(uploads: &Path, distance: Option<f64>) -> Router {
        app_with_limit(uploads, distance, 1024 * 1024)
    }

    fn app_with_limit(uploads: &Path, distance: Option<f64>, max_upload_bytes: usize) -> Router {
        let thresholds = Thresholds::default();
        let engine = spawn_engine(thresholds.clone(), 4).unwrap();
        let pipeline = Pipeline::new(
            engine,
            Arc::new(FakeFace { distance }),
            Arc::new(FakeOcr),
            Arc::new(OfflineNarrator),
            thresholds,
        );
        let state = Arc::new(AppState {
            pipeline,
            uploads: UploadStore::new(uploads),
        });
        app_router(state, max_upload_bytes)
    }

    fn png(value: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        GrayImage::from_pixel(32, 32, Luma([value]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    enum Part<'a> {
        File(&'a str, Vec<u8>),
        Text(&'a str, &'a str),
    }

    fn multipart_request(parts: Vec<Part<'_>>) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::File(name, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\n\
                             Content-Type: image/png\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(&bytes);
                }
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}").as_bytes(),
                    );
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/verify")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn all_parts<'a>() -> Vec<Part<'a>> {
        vec![
            Part::File("photo", png(90)),
            Part::File("document", png(180)),
            Part::Text("name", "Maria da Silva"),
            Part::Text("document_type", "RG"),
        ]
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_index() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(app(dir.path(), Some(0.2)), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Identity verification API");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["endpoints"]["POST /verify"].is_string());
    }

    #[tokio::test]
    async fn test_each_missing_part_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for missing in ["photo", "document", "name", "document_type"] {
            let parts = all_parts()
                .into_iter()
                .filter(|p| match p {
                    Part::File(name, _) | Part::Text(name, _) => *name != missing,
                })
                .collect();
            let (status, body) = send(app(dir.path(), Some(0.2)), multipart_request(parts)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "missing {missing}");
            assert_eq!(body, json!({"error": "Missing required parameters"}));
        }
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/verify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name": "x"}"#))
            .unwrap();
        let (status, body) = send(app(dir.path(), Some(0.2)), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing required parameters"}));
    }

    #[tokio::test]
    async fn test_verify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(app(dir.path(), Some(0.2)), multipart_request(all_parts())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["face_swap_detected"], false);
        assert_eq!(body["crop_or_edit_detected"], false);
        assert_eq!(body["face_swap_check"]["status"], "not_detected");
        assert_eq!(body["liveness_detected"], true);
        assert_eq!(body["brightness"].as_f64().unwrap(), 90.0);
        assert_eq!(body["contrast"].as_f64().unwrap(), 0.0);
        assert!((body["similarity_score"].as_f64().unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(body["document_analysis"]["success"], true);
        assert_eq!(body["document_analysis"]["validation"]["confidence"], 80);
        assert_eq!(body["verdict"], "APPROVED");
        assert_eq!(body["report_source"], "fallback");
        assert!(body["report"].as_str().unwrap().contains("FINAL VERDICT: APPROVED"));
        assert!(body["request_id"].is_string());

        // Upload slot removed once the response is built.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_is_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(app(dir.path(), None), multipart_request(all_parts())).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["similarity_score"].is_string());
        assert_eq!(body["verdict"], "REJECTED");
    }

    #[tokio::test]
    async fn test_undecodable_photo() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![
            Part::File("photo", b"not an image".to_vec()),
            Part::File("document", png(180)),
            Part::Text("name", "Maria da Silva"),
            Part::Text("document_type", "RG"),
        ];
        let (status, body) = send(app(dir.path(), Some(0.2)), multipart_request(parts)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().starts_with("Photo could not be decoded"));
    }

    #[tokio::test]
    async fn test_undecodable_document_fails_soft() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![
            Part::File("photo", png(90)),
            Part::File("document", b"garbage".to_vec()),
            Part::Text("name", "Maria da Silva"),
            Part::Text("document_type", "RG"),
        ];
        let (status, body) = send(app(dir.path(), Some(0.2)), multipart_request(parts)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document_analysis"]["success"], false);
        assert!(body["document_analysis"]["error"].is_string());
        assert_eq!(body["verdict"], "REJECTED");
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![
            Part::File("photo", vec![0u8; 10 * 1024]),
            Part::File("document", png(180)),
            Part::Text("name", "Maria da Silva"),
            Part::Text("document_type", "RG"),
        ];
        let (status, body) = send(app_with_limit(dir.path(), Some(0.2), 1024), multipart_request(parts)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"error": "Upload exceeds size limit"}));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
