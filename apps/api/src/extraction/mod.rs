//! Format Extractor: uploaded file to plain text.
//!
//! Extraction is total: every failure is folded into an in-band
//! `[Extraction error: ...]` string so one malformed file never aborts the
//! batch it arrived in.

pub mod docx;
pub mod pdf;
pub mod pptx;
pub mod source_pack;

use std::path::Path;
use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::uploads::UploadedDocument;

pub use source_pack::SourcePack;

pub const IMAGE_PLACEHOLDER: &str = "[Image uploaded. OCR is not enabled in this prototype.]";

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "csv", "json", "md", "ts", "js", "py", "java", "c", "cpp",
];

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Pdf(String),

    #[error("invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("missing package part '{0}'")]
    MissingPart(String),
}

/// Extractor chosen for a file. First match wins, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    PlainText,
    Image,
    Unknown,
}

impl DocumentFormat {
    pub fn detect(file_name: &str, mime_type: &str) -> Self {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let mime = mime_type.to_ascii_lowercase();

        if ext == "pdf" || mime.contains("pdf") {
            DocumentFormat::Pdf
        } else if ext == "docx" || mime.contains("wordprocessingml") {
            DocumentFormat::Docx
        } else if ext == "pptx" || mime.contains("presentationml") {
            DocumentFormat::Pptx
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) || mime.starts_with("text/") {
            DocumentFormat::PlainText
        } else if mime.starts_with("image/") {
            DocumentFormat::Image
        } else {
            DocumentFormat::Unknown
        }
    }
}

/// Text extracted from one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSection {
    pub source_name: String,
    pub mime_type: String,
    pub text: String,
}

/// Strips carriage returns, collapses runs of 3+ newlines to a blank line,
/// and trims.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\r', "");
    EXCESS_NEWLINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

fn error_text(message: impl std::fmt::Display) -> String {
    format!("[Extraction error: {message}]")
}

/// Synchronous, CPU-bound extraction of an in-memory file. Never panics on
/// malformed input.
pub fn extract_bytes(bytes: &[u8], format: DocumentFormat) -> String {
    let result = match format {
        DocumentFormat::Pdf => pdf::extract_pdf(bytes),
        DocumentFormat::Docx => docx::extract_docx(bytes),
        DocumentFormat::Pptx => pptx::extract_pptx(bytes),
        DocumentFormat::PlainText | DocumentFormat::Unknown => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        DocumentFormat::Image => return IMAGE_PLACEHOLDER.to_string(),
    };

    match result {
        Ok(text) => clean_text(&text),
        Err(e) => {
            warn!(?format, "Extraction failed: {e}");
            error_text(e)
        }
    }
}

pub async fn extract_document(doc: &UploadedDocument) -> ExtractedSection {
    let format = DocumentFormat::detect(&doc.original_name, &doc.mime_type);

    let text = match format {
        DocumentFormat::Image => IMAGE_PLACEHOLDER.to_string(),
        _ => match tokio::fs::read(doc.path()).await {
            Ok(bytes) => tokio::task::spawn_blocking(move || extract_bytes(&bytes, format))
                .await
                .unwrap_or_else(|e| error_text(e)),
            // Unreadable files of unknown type contribute nothing.
            Err(_) if format == DocumentFormat::Unknown => String::new(),
            Err(e) => error_text(e),
        },
    };

    debug!(
        file = %doc.original_name,
        bytes = doc.size_bytes,
        ?format,
        chars = text.chars().count(),
        "Extracted document"
    );

    ExtractedSection {
        source_name: doc.original_name.clone(),
        mime_type: doc.mime_type.clone(),
        text,
    }
}

/// Extracts every document concurrently; output order matches input order.
pub async fn extract_all(docs: &[UploadedDocument]) -> Vec<ExtractedSection> {
    join_all(docs.iter().map(extract_document)).await
}
