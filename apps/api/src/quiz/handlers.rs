use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{extract_all, SourcePack};
use crate::quiz::generator::{GenerationOutcome, QuizGenerator};
use crate::quiz::models::{Difficulty, GenerationRequest, QuizType};
use crate::state::AppState;
use crate::uploads::multipart::{read_quiz_form, QuizForm};
use crate::uploads::UploadBatch;

/// POST /api/generate-quiz
///
/// 200 with the envelope when a quiz was accepted, 422 with the envelope
/// otherwise. Input errors are 400 and never reach extraction or upload.
pub async fn handle_generate_quiz(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<GenerationOutcome>), AppError> {
    let QuizForm {
        batch,
        quiz_type,
        question_count,
        difficulty,
    } = read_quiz_form(&mut multipart, &state.config.upload_dir)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                AppError::Validation(e.to_string())
            } else {
                AppError::Internal(e.into())
            }
        })?;

    let request = match parse_request(
        !batch.is_empty(),
        quiz_type.as_deref(),
        question_count.as_deref(),
        difficulty.as_deref(),
    ) {
        Ok(request) => request,
        Err(e) => {
            batch.cleanup().await;
            return Err(e);
        }
    };

    // Spawned so that a dropped connection cannot skip local cleanup.
    let generator = state.generator.clone();
    let span = info_span!("generate_quiz", request_id = %Uuid::new_v4());
    let outcome = tokio::spawn(
        async move { run_pipeline(&generator, batch, request).await }.instrument(span),
    )
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("pipeline task failed: {e}")))?;

    let status = if outcome.ok {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(outcome)))
}

async fn run_pipeline(
    generator: &QuizGenerator,
    batch: UploadBatch,
    request: GenerationRequest,
) -> GenerationOutcome {
    info!(files = batch.len(), "Extracting uploaded documents");
    let sections = extract_all(batch.documents()).await;
    let pack = SourcePack::assemble(&sections);

    let outcome = generator.generate(batch.documents(), &pack, &request).await;

    batch.cleanup().await;
    info!(ok = outcome.ok, "Generation finished");
    outcome
}

/// Checks run in a fixed order; the first failure is reported.
fn parse_request(
    has_files: bool,
    quiz_type: Option<&str>,
    question_count: Option<&str>,
    difficulty: Option<&str>,
) -> Result<GenerationRequest, AppError> {
    if !has_files {
        return Err(AppError::Validation(
            "At least one file is required.".to_string(),
        ));
    }

    let question_count = question_count
        .map(str::trim)
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|n| n.fract() == 0.0 && (1.0..=100.0).contains(n))
        .map(|n| n as u32)
        .ok_or_else(|| {
            AppError::Validation("questionCount must be an integer from 1-100.".to_string())
        })?;

    let quiz_type = quiz_type
        .and_then(|raw| raw.parse::<QuizType>().ok())
        .ok_or_else(|| AppError::Validation("Invalid quizType.".to_string()))?;

    let difficulty = match difficulty {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<Difficulty>().map_err(|_| {
            AppError::Validation("difficulty must be easy|medium|hard.".to_string())
        })?),
    };

    GenerationRequest::new(quiz_type, question_count, difficulty).ok_or_else(|| {
        AppError::Validation("questionCount must be an integer from 1-100.".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: Result<GenerationRequest, AppError>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_parses_complete_form() {
        let request = parse_request(true, Some("mixed"), Some(" 12 "), Some("hard")).unwrap();
        assert_eq!(request.quiz_type(), QuizType::Mixed);
        assert_eq!(request.question_count(), 12);
        assert_eq!(request.difficulty(), Some(Difficulty::Hard));
    }

    #[test]
    fn test_integral_float_count_is_accepted() {
        let request = parse_request(true, Some("mcq"), Some("5.0"), None).unwrap();
        assert_eq!(request.question_count(), 5);
    }

    #[test]
    fn test_empty_difficulty_means_unset() {
        let request = parse_request(true, Some("mcq"), Some("1"), Some("")).unwrap();
        assert_eq!(request.difficulty(), None);
    }

    #[test]
    fn test_missing_files_reported_first() {
        assert_eq!(
            message(parse_request(false, Some("essay"), Some("0"), Some("x"))),
            "At least one file is required."
        );
    }

    #[test]
    fn test_bad_counts_are_rejected() {
        for raw in ["0", "101", "2.5", "", "ten", "NaN", "inf"] {
            assert_eq!(
                message(parse_request(true, Some("mcq"), Some(raw), None)),
                "questionCount must be an integer from 1-100.",
                "count {raw:?}"
            );
        }
        assert!(parse_request(true, Some("mcq"), None, None).is_err());
    }

    #[test]
    fn test_bad_quiz_type_is_rejected() {
        assert_eq!(
            message(parse_request(true, Some("essay"), Some("3"), None)),
            "Invalid quizType."
        );
        assert_eq!(message(parse_request(true, None, Some("3"), None)), "Invalid quizType.");
    }

    #[test]
    fn test_bad_difficulty_is_rejected() {
        assert_eq!(
            message(parse_request(true, Some("mcq"), Some("3"), Some("extreme"))),
            "difficulty must be easy|medium|hard."
        );
    }
}
