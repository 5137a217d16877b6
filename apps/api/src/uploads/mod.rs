//! Request-scoped temp files for uploaded documents.
//!
//! Every file of a request lives in one [`UploadBatch`]. The batch owns the
//! on-disk paths; [`UploadBatch::cleanup`] unlinks them all and reports what
//! could not be removed. Dropping a batch without calling `cleanup` still
//! unlinks through `TempPath`'s destructor.

pub mod multipart;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const MAX_FILES: usize = 10;
pub const MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Each file must be <= 20MB.")]
    FileTooLarge,

    #[error("Maximum 10 files allowed per request.")]
    TooManyFiles,

    #[error("Unexpected file field '{0}'.")]
    UnexpectedField(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the caller sent something wrong, as opposed to a local failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, UploadError::Io(_))
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct UploadedDocument {
    path: TempPath,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl UploadedDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A file being streamed to disk. Dropping it before [`finish`](Self::finish)
/// removes the partial file.
pub struct PendingUpload {
    file: tokio::fs::File,
    path: TempPath,
    original_name: String,
    mime_type: String,
    written: u64,
}

impl PendingUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let written = self.written + chunk.len() as u64;
        if written > MAX_FILE_BYTES {
            return Err(UploadError::FileTooLarge);
        }
        self.file.write_all(chunk).await?;
        self.written = written;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<UploadedDocument, UploadError> {
        self.file.flush().await?;
        Ok(UploadedDocument {
            path: self.path,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size_bytes: self.written,
        })
    }
}

#[derive(Debug)]
pub struct UploadBatch {
    dir: PathBuf,
    documents: Vec<UploadedDocument>,
}

impl UploadBatch {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            documents: Vec::new(),
        }
    }

    pub fn documents(&self) -> &[UploadedDocument] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Opens `upload-<random>-<sanitized name>` in the batch directory.
    pub fn begin(&self, original_name: &str, mime_type: &str) -> Result<PendingUpload, UploadError> {
        if self.documents.len() >= MAX_FILES {
            return Err(UploadError::TooManyFiles);
        }

        let suffix = format!("-{}", sanitize_file_name(original_name));
        let named = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)?;
        let (file, path) = named.into_parts();

        Ok(PendingUpload {
            file: tokio::fs::File::from_std(file),
            path,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            written: 0,
        })
    }

    pub fn push(&mut self, document: UploadedDocument) {
        self.documents.push(document);
    }

    /// Stores an in-memory file as one more document of the batch.
    pub async fn add_bytes(
        &mut self,
        original_name: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<(), UploadError> {
        let mut pending = self.begin(original_name, mime_type)?;
        pending.write_chunk(bytes).await?;
        let document = pending.finish().await?;
        self.push(document);
        Ok(())
    }

    /// Unlinks every file off the async executor. Each removal is
    /// independent; failures are logged and returned, never raised. An
    /// already-missing file counts as removed.
    pub async fn cleanup(self) -> Vec<String> {
        let documents = self.documents;
        tokio::task::spawn_blocking(move || remove_all(documents))
            .await
            .unwrap_or_else(|e| {
                warn!("Temp file cleanup task failed: {e}");
                vec![format!("cleanup task failed: {e}")]
            })
    }
}

fn remove_all(documents: Vec<UploadedDocument>) -> Vec<String> {
    let mut errors = Vec::new();

    for document in documents {
        let name = document.original_name;
        match document.path.close() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove temp file for {name}: {e}");
                errors.push(format!("{name}: {e}"));
            }
        }
    }

    errors
}
