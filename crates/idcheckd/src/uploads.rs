use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("failed to create upload directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write upload {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-request upload storage.
///
/// Every request gets its own directory `{root}/{uuid}`; concurrent requests
/// never share a file. The directory is removed when its [`UploadSlot`] is
/// dropped.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Allocate a fresh slot directory.
    pub async fn open_slot(&self) -> Result<UploadSlot, UploadError> {
        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| UploadError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(UploadSlot { id, dir })
    }
}

/// Which uploaded part a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Document,
}

impl UploadKind {
    fn file_name(self) -> &'static str {
        match self {
            UploadKind::Photo => "photo",
            UploadKind::Document => "document",
        }
    }
}

/// A stored upload with its integrity metadata.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub size: usize,
    pub sha256: String,
}

/// Storage owned by one request.
#[derive(Debug)]
pub struct UploadSlot {
    id: Uuid,
    dir: PathBuf,
}

impl UploadSlot {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: UploadKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Scratch file for the binarized document handed to OCR.
    pub fn ocr_input_path(&self) -> PathBuf {
        self.dir.join("document.ocr.png")
    }

    pub async fn write(&self, kind: UploadKind, bytes: &[u8]) -> Result<StoredUpload, UploadError> {
        let path = self.path(kind);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| UploadError::Write {
                path: path.clone(),
                source,
            })?;

        let upload = StoredUpload {
            size: bytes.len(),
            sha256: format!("{:x}", Sha256::digest(bytes)),
        };
        tracing::debug!(
            request_id = %self.id,
            kind = kind.file_name(),
            size = upload.size,
            sha256 = %upload.sha256,
            "upload stored"
        );
        Ok(upload)
    }
}

// Removal runs inline on the dropping thread, async worker included. A slot
// holds at most three small files and must be gone before the response is sent.
impl Drop for UploadSlot {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            tracing::warn!(request_id = %self.id, error = %e, "failed to remove upload slot");
        }
    }
}
