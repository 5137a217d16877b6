//! The output contract sent to the provider to constrain generation.

use serde_json::{json, Value};

/// Name under which the schema is registered with the provider.
pub const QUIZ_SCHEMA_NAME: &str = "quiz_schema";

/// JSON Schema for the model's response: a closed top-level object whose
/// `questions` are a four-variant union keyed by `type`.
pub fn quiz_json_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["quiz_title", "quiz_type", "question_count", "source_summary", "questions"],
        "properties": {
            "quiz_title": { "type": "string" },
            "quiz_type": {
                "type": "string",
                "enum": ["mcq", "fill_blank", "identification", "matching", "mixed"]
            },
            "question_count": { "type": "number" },
            "source_summary": { "type": "string" },
            "questions": {
                "type": "array",
                "items": {
                    "oneOf": [
                        mcq_variant(),
                        answers_variant("fill_blank"),
                        answers_variant("identification"),
                        matching_variant()
                    ]
                }
            }
        }
    })
}

/// Pretty-printed schema text embedded in the user prompt.
pub fn quiz_json_schema_text() -> String {
    serde_json::to_string_pretty(&quiz_json_schema()).unwrap_or_default()
}

fn mcq_variant() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["id", "type", "prompt", "choices", "answer_index", "explanation"],
        "properties": {
            "id": { "type": "string" },
            "type": { "type": "string", "const": "mcq" },
            "prompt": { "type": "string" },
            "choices": { "type": "array", "items": { "type": "string" } },
            "answer_index": { "type": "number" },
            "explanation": { "type": "string" }
        }
    })
}

fn answers_variant(tag: &str) -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["id", "type", "prompt", "answers", "explanation"],
        "properties": {
            "id": { "type": "string" },
            "type": { "type": "string", "const": tag },
            "prompt": { "type": "string" },
            "answers": { "type": "array", "items": { "type": "string" } },
            "explanation": { "type": "string" }
        }
    })
}

fn matching_variant() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["id", "type", "pairs", "explanation"],
        "properties": {
            "id": { "type": "string" },
            "type": { "type": "string", "const": "matching" },
            "pairs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["left", "right"],
                    "properties": {
                        "left": { "type": "string" },
                        "right": { "type": "string" }
                    }
                }
            },
            "explanation": { "type": "string" }
        }
    })
}
