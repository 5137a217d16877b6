use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::debug;

use super::ExtractionError;

/// Full-document text of a PDF.
///
/// `pdf_extract` can panic on malformed input, so the call is isolated and a
/// panic is reported as an ordinary extraction error.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let result = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    match result {
        Ok(Ok(text)) => {
            debug!("PDF extracted: {} chars", text.len());
            Ok(text)
        }
        Ok(Err(e)) => Err(ExtractionError::Pdf(e.to_string())),
        Err(_) => Err(ExtractionError::Pdf(
            "PDF parser panicked on malformed input".to_string(),
        )),
    }
}
