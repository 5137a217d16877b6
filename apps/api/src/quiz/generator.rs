//! Generation Orchestrator.
//!
//! `start → uploading → requesting → parsing → validating → accepted | rejected | errored`
//!
//! Remote files uploaded for a request are released in a finalization step
//! that runs after every terminal state. Release failures are recorded in the
//! envelope's debug block and never replace the primary result.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::extraction::SourcePack;
use crate::llm_client::{strip_json_fences, GenerationCall, LlmError, QuizProvider};
use crate::quiz::models::{GenerationRequest, Quiz};
use crate::quiz::prompts::{assemble_user_text, build_system_prompt, build_user_prompt};
use crate::quiz::schema::{quiz_json_schema, quiz_json_schema_text};
use crate::quiz::validation::validate_quiz;
use crate::uploads::UploadedDocument;

pub const INVALID_OUTPUT_ERROR: &str = "Invalid JSON or schema mismatch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Uploading,
    Requesting,
    Parsing,
    Validating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Uploading => "uploading",
            Stage::Requesting => "requesting",
            Stage::Parsing => "parsing",
            Stage::Validating => "validating",
        })
    }
}

/// Result envelope returned to the caller for every generation attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub debug: DebugInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    pub file_ids: Vec<String>,
    pub source_pack_length: usize,
    pub source_pack_preview: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_errors: Vec<String>,
}

enum Failure {
    Provider(LlmError),
    /// Model text that is not JSON (`details: None`) or not a valid quiz.
    InvalidOutput { details: Option<String> },
}

/// What the request/parse/validate stages produced.
struct Attempt {
    response_id: Option<String>,
    raw: Option<String>,
    result: Result<Quiz, Failure>,
}

impl Attempt {
    fn provider_error(error: LlmError) -> Self {
        Self {
            response_id: None,
            raw: None,
            result: Err(Failure::Provider(error)),
        }
    }
}

pub struct QuizGenerator {
    provider: Arc<dyn QuizProvider>,
    keep_remote_files: bool,
}

impl QuizGenerator {
    pub fn new(provider: Arc<dyn QuizProvider>, keep_remote_files: bool) -> Self {
        Self {
            provider,
            keep_remote_files,
        }
    }

    pub async fn generate(
        &self,
        documents: &[UploadedDocument],
        pack: &SourcePack,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        info!(stage = %Stage::Uploading, files = documents.len(), "Uploading source files");
        let (file_ids, upload_error) = self.upload_all(documents).await;

        let attempt = match upload_error {
            Some(e) => Attempt::provider_error(e),
            None => self.attempt(&file_ids, pack, request).await,
        };

        let cleanup_errors = self.release(&file_ids).await;

        let debug = DebugInfo {
            response_id: attempt.response_id,
            file_ids,
            source_pack_length: pack.char_len(),
            source_pack_preview: pack.preview(),
            cleanup_errors,
        };

        match attempt.result {
            Ok(quiz) => {
                info!(questions = quiz.questions.len(), "Quiz accepted");
                GenerationOutcome {
                    ok: true,
                    quiz: Some(quiz),
                    error: None,
                    raw: None,
                    details: None,
                    debug,
                }
            }
            Err(Failure::InvalidOutput { details }) => GenerationOutcome {
                ok: false,
                quiz: None,
                error: Some(INVALID_OUTPUT_ERROR.to_string()),
                raw: attempt.raw,
                details,
                debug,
            },
            Err(Failure::Provider(e)) => {
                warn!("Generation failed: {e}");
                GenerationOutcome {
                    ok: false,
                    quiz: None,
                    error: Some(e.to_string()),
                    raw: attempt.raw,
                    details: None,
                    debug,
                }
            }
        }
    }

    /// Uploads concurrently. Returns the ids that succeeded, in document
    /// order, and the first failure if any upload failed.
    async fn upload_all(&self, documents: &[UploadedDocument]) -> (Vec<String>, Option<LlmError>) {
        let results = join_all(
            documents
                .iter()
                .map(|doc| self.provider.upload_file(doc.path(), &doc.original_name)),
        )
        .await;

        let mut file_ids = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(handle) => {
                    debug!(
                        id = %handle.id,
                        file = %handle.file_name,
                        bytes = ?handle.size_bytes,
                        "Remote file ready"
                    );
                    file_ids.push(handle.id);
                }
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!("Additional upload failure: {e}"),
            }
        }

        (file_ids, first_error)
    }

    async fn attempt(
        &self,
        file_ids: &[String],
        pack: &SourcePack,
        request: &GenerationRequest,
    ) -> Attempt {
        let system_prompt = build_system_prompt();
        let user_prompt = build_user_prompt(request, &quiz_json_schema_text());
        let user_text = assemble_user_text(&user_prompt, pack.as_str());
        let schema = quiz_json_schema();

        let call = GenerationCall {
            system_prompt: &system_prompt,
            user_text: &user_text,
            schema: &schema,
            file_ids,
        };

        info!(stage = %Stage::Requesting, quiz_type = %request.quiz_type(), count = request.question_count(), "Requesting quiz");
        let response = match self.provider.create_response(&call).await {
            Ok(response) => response,
            Err(e) => return Attempt::provider_error(e),
        };

        info!(stage = %Stage::Parsing, response_id = ?response.id, "Parsing model output");
        let parsed: Value = match serde_json::from_str(strip_json_fences(&response.text)) {
            Ok(value) => value,
            Err(e) => {
                warn!("Model output is not JSON: {e}");
                return Attempt {
                    response_id: response.id,
                    raw: Some(response.text),
                    result: Err(Failure::InvalidOutput { details: None }),
                };
            }
        };

        info!(stage = %Stage::Validating, "Validating quiz");
        match validate_quiz(&parsed) {
            Ok(quiz) => Attempt {
                response_id: response.id,
                raw: None,
                result: Ok(quiz),
            },
            Err(violations) => {
                warn!(violations = violations.len(), "Model output failed validation");
                Attempt {
                    response_id: response.id,
                    raw: Some(response.text),
                    result: Err(Failure::InvalidOutput {
                        details: serde_json::to_string_pretty(&violations).ok(),
                    }),
                }
            }
        }
    }

    /// Deletes every uploaded file concurrently unless retention is on.
    /// Returns `<fileId>: <message>` for each deletion that failed.
    async fn release(&self, file_ids: &[String]) -> Vec<String> {
        if self.keep_remote_files || file_ids.is_empty() {
            return Vec::new();
        }

        let results = join_all(file_ids.iter().map(|id| self.provider.delete_file(id))).await;

        file_ids
            .iter()
            .zip(results)
            .filter_map(|(id, result)| {
                result.err().map(|e| {
                    warn!("Failed to delete remote file {id}: {e}");
                    format!("{id}: {e}")
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::extraction::{extract_all, SourcePack};
    use crate::quiz::models::{QuizType, MAX_QUESTION_COUNT};
    use crate::test_utils::fixtures::{identification_quiz_json, mcq_question, quiz_json};
    use crate::test_utils::FakeProvider;
    use crate::uploads::UploadBatch;

    async fn batch_with(dir: &std::path::Path, count: usize) -> UploadBatch {
        let mut batch = UploadBatch::new(dir);
        for i in 0..count {
            batch
                .add_bytes(&format!("notes{i}.txt"), "text/plain", b"Paris is the capital of France.")
                .await
                .unwrap();
        }
        batch
    }

    fn request(quiz_type: QuizType, count: u32) -> GenerationRequest {
        GenerationRequest::new(quiz_type, count, None).unwrap()
    }

    async fn run(
        provider: Arc<FakeProvider>,
        keep: bool,
        files: usize,
        request: GenerationRequest,
    ) -> GenerationOutcome {
        let dir = tempfile::tempdir().unwrap();
        let batch = batch_with(dir.path(), files).await;
        let pack = SourcePack::assemble(&extract_all(batch.documents()).await);
        let generator = QuizGenerator::new(provider, keep);
        let outcome = generator.generate(batch.documents(), &pack, &request).await;
        batch.cleanup().await;
        outcome
    }

    #[tokio::test]
    async fn test_accepts_valid_quiz_and_releases_files() {
        let provider = Arc::new(FakeProvider::responding(identification_quiz_json().to_string()));
        let outcome = run(provider.clone(), false, 2, request(QuizType::Identification, 1)).await;

        assert!(outcome.ok, "{outcome:?}");
        assert_eq!(outcome.quiz.as_ref().unwrap().quiz_title, "Geo");
        assert!(outcome.raw.is_none());
        assert_eq!(outcome.debug.response_id.as_deref(), Some("resp_fake"));
        assert_eq!(outcome.debug.file_ids, vec!["file-0", "file-1"]);
        assert_eq!(provider.deleted(), vec!["file-0", "file-1"]);
    }

    #[tokio::test]
    async fn test_request_embeds_source_pack_and_file_ids() {
        let provider = Arc::new(FakeProvider::responding(identification_quiz_json().to_string()));
        run(provider.clone(), false, 1, request(QuizType::Identification, 1)).await;

        let call = provider.last_call().unwrap();
        assert!(call.user_text.contains("=== SOURCE PACK (EXTRACTED TEXT) ===\n### FILE: notes0.txt (text/plain)\nParis is the capital of France."));
        assert!(call.user_text.contains("Requested quizType: identification"));
        assert!(call.system_prompt.starts_with("You are a strict quiz JSON generator."));
        assert_eq!(call.file_ids, vec!["file-0"]);
        assert_eq!(call.schema, quiz_json_schema());
    }

    #[tokio::test]
    async fn test_non_json_output_keeps_raw_text() {
        let provider = Arc::new(FakeProvider::responding("Sorry, I can't help."));
        let outcome = run(provider.clone(), false, 1, request(QuizType::Mcq, 3)).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some(INVALID_OUTPUT_ERROR));
        assert_eq!(outcome.raw.as_deref(), Some("Sorry, I can't help."));
        assert!(outcome.details.is_none());
        assert_eq!(provider.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_fenced_json_is_accepted() {
        let fenced = format!("```json\n{}\n```", identification_quiz_json());
        let provider = Arc::new(FakeProvider::responding(fenced));
        let outcome = run(provider, false, 1, request(QuizType::Identification, 1)).await;
        assert!(outcome.ok, "{outcome:?}");
    }

    #[tokio::test]
    async fn test_schema_violation_carries_details() {
        let mut bad = quiz_json("mcq", vec![mcq_question("q1"), mcq_question("q2"), mcq_question("q3")]);
        bad["question_count"] = json!(5);
        let provider = Arc::new(FakeProvider::responding(bad.to_string()));

        let outcome = run(provider, false, 1, request(QuizType::Mcq, 5)).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some(INVALID_OUTPUT_ERROR));
        assert!(outcome.raw.is_some());
        let details: Value = serde_json::from_str(outcome.details.as_deref().unwrap()).unwrap();
        assert_eq!(details[0]["path"], "question_count");
    }

    #[tokio::test]
    async fn test_upload_failure_skips_generation_but_releases_successes() {
        let provider = Arc::new(
            FakeProvider::responding(identification_quiz_json().to_string()).failing_upload_of("notes1.txt"),
        );
        let outcome = run(provider.clone(), false, 3, request(QuizType::Identification, 1)).await;

        assert!(!outcome.ok);
        assert!(outcome.error.unwrap().contains("upload rejected"));
        assert!(outcome.debug.response_id.is_none());
        assert_eq!(provider.generation_calls(), 0);
        assert_eq!(outcome.debug.file_ids.len(), 2);
        assert_eq!(provider.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_generation_failure_still_releases_files() {
        let provider = Arc::new(FakeProvider::failing_generation());
        let outcome = run(provider.clone(), false, 2, request(QuizType::Mixed, 4)).await;

        assert!(!outcome.ok);
        assert!(outcome.raw.is_none());
        assert_eq!(provider.uploaded().len(), 2);
        assert_eq!(provider.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_retention_flag_skips_deletion() {
        let provider = Arc::new(FakeProvider::responding(identification_quiz_json().to_string()));
        let outcome = run(provider.clone(), true, 2, request(QuizType::Identification, 1)).await;

        assert!(outcome.ok);
        assert!(provider.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_failures_are_recorded_not_raised() {
        let provider = Arc::new(
            FakeProvider::responding(identification_quiz_json().to_string()).failing_deletes(),
        );
        let outcome = run(provider.clone(), false, 2, request(QuizType::Identification, 1)).await;

        assert!(outcome.ok);
        assert_eq!(outcome.debug.cleanup_errors.len(), 2);
        assert!(outcome.debug.cleanup_errors[0].starts_with("file-0: "));
    }

    #[tokio::test]
    async fn test_envelope_serializes_camel_case_debug_block() {
        let provider = Arc::new(FakeProvider::responding("nope"));
        let outcome = run(provider, false, 1, request(QuizType::Mcq, MAX_QUESTION_COUNT)).await;

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["ok"], false);
        assert!(value.get("quiz").is_none());
        assert!(value["debug"]["sourcePackLength"].as_u64().unwrap() > 0);
        assert!(value["debug"]["sourcePackPreview"]
            .as_str()
            .unwrap()
            .starts_with("### FILE: notes0.txt"));
        assert!(value["debug"].get("cleanupErrors").is_none());
    }
}
