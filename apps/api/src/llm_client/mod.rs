/// LLM Client: the single point of entry for all model-provider calls in Quizforge.
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// The generator talks to [`QuizProvider`]; [`LlmClient`] is the production
/// implementation against an xAI/OpenAI-compatible `files` + `responses` API.
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::quiz::schema::QUIZ_SCHEMA_NAME;

const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
const FILE_PURPOSE: &str = "assistants";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

/// Opaque id of a file accepted by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileHandle {
    pub id: String,
    pub file_name: String,
    pub size_bytes: Option<u64>,
}

/// Everything one schema-constrained generation call carries.
#[derive(Debug, Clone, Copy)]
pub struct GenerationCall<'a> {
    pub system_prompt: &'a str,
    pub user_text: &'a str,
    pub schema: &'a Value,
    pub file_ids: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub id: Option<String>,
    pub text: String,
}

/// Provider boundary. Every call may fail; callers must not assume success.
#[async_trait]
pub trait QuizProvider: Send + Sync {
    async fn upload_file(&self, path: &Path, file_name: &str)
        -> Result<RemoteFileHandle, LlmError>;

    async fn create_response(&self, call: &GenerationCall<'_>)
        -> Result<ProviderResponse, LlmError>;

    async fn delete_file(&self, id: &str) -> Result<(), LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    temperature: f32,
    store: bool,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    InputText { text: &'a str },
    InputFile { file_id: &'a str },
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
    filename: Option<String>,
    bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn build_request<'a>(model: &'a str, call: &GenerationCall<'a>) -> ResponsesRequest<'a> {
    let mut parts = Vec::with_capacity(call.file_ids.len() + 1);
    parts.push(ContentPart::InputText {
        text: call.user_text,
    });
    parts.extend(
        call.file_ids
            .iter()
            .map(|id| ContentPart::InputFile { file_id: id }),
    );

    ResponsesRequest {
        model,
        input: vec![
            InputMessage {
                role: "system",
                content: MessageContent::Text(call.system_prompt),
            },
            InputMessage {
                role: "user",
                content: MessageContent::Parts(parts),
            },
        ],
        temperature: 0.0,
        store: false,
        response_format: ResponseFormat {
            format_type: "json_schema",
            json_schema: JsonSchemaFormat {
                name: QUIZ_SCHEMA_NAME,
                schema: call.schema,
                strict: true,
            },
        },
    }
}

/// `output_text` when the provider supplies it; otherwise every text segment
/// under `output[].content[]`, newline-joined and trimmed.
fn response_text(body: &Value) -> String {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    let Some(output) = body.get("output").and_then(Value::as_array) else {
        return String::new();
    };

    let parts: Vec<&str> = output
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter_map(|segment| {
            segment
                .get("text")
                .and_then(Value::as_str)
                .or_else(|| segment.get("output_text").and_then(Value::as_str))
        })
        .collect();

    parts.join("\n").trim().to_string()
}

/// Turns a non-success response into `LlmError::Api`, preferring the
/// provider's own error message when the body parses.
async fn api_error(response: Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Wraps the provider's files and responses endpoints with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry_backoff: Duration,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()?,
            base_url: config.xai_base_url.clone(),
            api_key: config.xai_api_key.clone(),
            model: config.xai_model.clone(),
            retry_backoff: RETRY_BACKOFF,
        })
    }

    #[cfg(test)]
    fn with_retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl QuizProvider for LlmClient {
    async fn upload_file(
        &self,
        path: &Path,
        file_name: &str,
    ) -> Result<RemoteFileHandle, LlmError> {
        let bytes = tokio::fs::read(path).await?;
        let form = multipart::Form::new()
            .text("purpose", FILE_PURPOSE)
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(file_name.to_string()),
            );

        let response = self
            .client
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let file: FileObject = serde_json::from_str(&response.text().await?)?;
        debug!("Uploaded {file_name} as {}", file.id);

        Ok(RemoteFileHandle {
            id: file.id,
            file_name: file.filename.unwrap_or_else(|| file_name.to_string()),
            size_bytes: file.bytes,
        })
    }

    /// Retries on 429 (rate limit), 5xx and transport errors with exponential
    /// backoff.
    async fn create_response(
        &self,
        call: &GenerationCall<'_>,
    ) -> Result<ProviderResponse, LlmError> {
        let request_body = build_request(&self.model, call);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_backoff, attempt);
                warn!(
                    "Generation attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.url("responses"))
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Provider returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            let body: Value = serde_json::from_str(&response.text().await?)?;
            let id = body.get("id").and_then(Value::as_str).map(str::to_string);
            let text = response_text(&body);

            debug!(
                "Generation call succeeded: response_id={:?}, chars={}",
                id,
                text.len()
            );

            return Ok(ProviderResponse { id, text });
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn delete_file(&self, id: &str) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(self.url(&format!("files/{id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

/// Exponential backoff before retry `attempt` (1-based): base, 2x base, ...
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.saturating_sub(1))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
