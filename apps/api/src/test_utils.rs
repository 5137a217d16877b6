//! Shared test doubles and fixtures.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm_client::{GenerationCall, LlmError, ProviderResponse, QuizProvider, RemoteFileHandle};

/// Snapshot of one generation call received by [`FakeProvider`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_text: String,
    pub schema: Value,
    pub file_ids: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    uploaded: Vec<String>,
    deleted: Vec<String>,
    calls: Vec<RecordedCall>,
    next_id: usize,
}

/// In-memory provider that records every call. Uploads get ids `file-0`,
/// `file-1`, ... in the order they succeed.
#[derive(Default)]
pub struct FakeProvider {
    response_text: Option<String>,
    failing_upload: Option<String>,
    failing_deletes: bool,
    state: Mutex<FakeState>,
}

impl FakeProvider {
    pub fn responding(text: impl Into<String>) -> Self {
        Self {
            response_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Every generation call fails with a 503.
    pub fn failing_generation() -> Self {
        Self::default()
    }

    pub fn failing_upload_of(mut self, file_name: &str) -> Self {
        self.failing_upload = Some(file_name.to_string());
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.state.lock().unwrap().uploaded.clone()
    }

    /// Ids whose deletion was attempted, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn generation_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.state.lock().unwrap().calls.last().cloned()
    }
}

#[async_trait]
impl QuizProvider for FakeProvider {
    async fn upload_file(&self, path: &Path, file_name: &str) -> Result<RemoteFileHandle, LlmError> {
        if self.failing_upload.as_deref() == Some(file_name) {
            return Err(LlmError::Api {
                status: 400,
                message: "upload rejected".to_string(),
            });
        }
        let size = std::fs::metadata(path)?.len();

        let mut state = self.state.lock().unwrap();
        let id = format!("file-{}", state.next_id);
        state.next_id += 1;
        state.uploaded.push(file_name.to_string());

        Ok(RemoteFileHandle {
            id,
            file_name: file_name.to_string(),
            size_bytes: Some(size),
        })
    }

    async fn create_response(&self, call: &GenerationCall<'_>) -> Result<ProviderResponse, LlmError> {
        self.state.lock().unwrap().calls.push(RecordedCall {
            system_prompt: call.system_prompt.to_string(),
            user_text: call.user_text.to_string(),
            schema: call.schema.clone(),
            file_ids: call.file_ids.to_vec(),
        });

        match &self.response_text {
            Some(text) => Ok(ProviderResponse {
                id: Some("resp_fake".to_string()),
                text: text.clone(),
            }),
            None => Err(LlmError::Api {
                status: 503,
                message: "provider unavailable".to_string(),
            }),
        }
    }

    async fn delete_file(&self, id: &str) -> Result<(), LlmError> {
        self.state.lock().unwrap().deleted.push(id.to_string());
        if self.failing_deletes {
            return Err(LlmError::Api {
                status: 500,
                message: "delete failed".to_string(),
            });
        }
        Ok(())
    }
}

pub mod fixtures {
    use serde_json::{json, Value};

    /// One identification question about Paris; accepted as-is.
    pub fn identification_quiz_json() -> Value {
        json!({
            "quiz_title": "Geo",
            "quiz_type": "identification",
            "question_count": 1,
            "source_summary": "One sentence about France.",
            "questions": [{
                "id": "q1",
                "type": "identification",
                "prompt": "Capital of France?",
                "answers": ["Paris"],
                "explanation": "The source names Paris as the capital."
            }]
        })
    }

    /// A quiz whose `question_count` matches `questions`.
    pub fn quiz_json(quiz_type: &str, questions: Vec<Value>) -> Value {
        json!({
            "quiz_title": "Fixture quiz",
            "quiz_type": quiz_type,
            "question_count": questions.len(),
            "source_summary": "Fixture source.",
            "questions": questions
        })
    }

    pub fn mcq_question(id: &str) -> Value {
        json!({
            "id": id,
            "type": "mcq",
            "prompt": "Which planet is largest?",
            "choices": ["Mars", "Jupiter", "Venus", "Mercury"],
            "answer_index": 1,
            "explanation": "Jupiter is the largest planet."
        })
    }

    pub fn fill_blank_question(id: &str) -> Value {
        json!({
            "id": id,
            "type": "fill_blank",
            "prompt": "Water boils at ____ degrees Celsius at sea level.",
            "answers": ["100", "one hundred"],
            "explanation": "Stated in the notes."
        })
    }

    pub fn matching_question(id: &str) -> Value {
        json!({
            "id": id,
            "type": "matching",
            "pairs": [
                {"left": "H", "right": "Hydrogen"},
                {"left": "O", "right": "Oxygen"},
                {"left": "N", "right": "Nitrogen"},
                {"left": "C", "right": "Carbon"}
            ],
            "explanation": "Element symbols."
        })
    }
}

pub mod documents {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Stored (uncompressed) zip archive of `(name, contents)` entries.
    pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Minimal .docx with one single-run paragraph per entry.
    pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", quick_xml::escape::escape(*p)))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        zip_bytes(&[("[Content_Types].xml", "<Types/>"), ("word/document.xml", &xml)])
    }

    /// Minimal .pptx: each slide part holds one `<a:t>` run per entry.
    pub fn pptx_bytes(slides: &[(&str, Vec<&str>)]) -> Vec<u8> {
        let parts: Vec<(String, String)> = slides
            .iter()
            .map(|(name, runs)| {
                let body: String = runs
                    .iter()
                    .map(|r| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", quick_xml::escape::escape(*r)))
                    .collect();
                (
                    name.to_string(),
                    format!("<p:sld><p:cSld><p:spTree>{body}</p:spTree></p:cSld></p:sld>"),
                )
            })
            .collect();
        let entries: Vec<(&str, &str)> = parts
            .iter()
            .map(|(n, x)| (n.as_str(), x.as_str()))
            .collect();
        zip_bytes(&entries)
    }
}
