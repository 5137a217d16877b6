use std::path::Path;

use axum::extract::Multipart;

use super::{UploadBatch, UploadError};

/// The only field name under which files are accepted.
pub const FILES_FIELD: &str = "files";

const DEFAULT_MIME: &str = "application/octet-stream";

/// Raw contents of a quiz-generation form. Text values are unvalidated.
#[derive(Debug)]
pub struct QuizForm {
    pub batch: UploadBatch,
    pub quiz_type: Option<String>,
    pub question_count: Option<String>,
    pub difficulty: Option<String>,
}

/// Streams every part of the form, writing files to `upload_dir` as they
/// arrive. Count and size limits are enforced mid-stream. On error, files
/// already written are removed before returning.
pub async fn read_quiz_form(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<QuizForm, UploadError> {
    let mut form = QuizForm {
        batch: UploadBatch::new(upload_dir),
        quiz_type: None,
        question_count: None,
        difficulty: None,
    };

    match read_parts(multipart, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            form.batch.cleanup().await;
            Err(e)
        }
    }
}

async fn read_parts(multipart: &mut Multipart, form: &mut QuizForm) -> Result<(), UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if name != FILES_FIELD {
                return Err(UploadError::UnexpectedField(name));
            }
            let mime_type = field.content_type().unwrap_or(DEFAULT_MIME).to_string();

            let mut pending = form.batch.begin(&file_name, &mime_type)?;
            while let Some(chunk) = field.chunk().await? {
                pending.write_chunk(&chunk).await?;
            }
            form.batch.push(pending.finish().await?);
            continue;
        }

        let value = field.text().await?;
        match name.as_str() {
            "quizType" => form.quiz_type = Some(value),
            "questionCount" => form.question_count = Some(value),
            "difficulty" => form.difficulty = Some(value),
            _ => {}
        }
    }

    Ok(())
}
