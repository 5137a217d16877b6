// Prompt constants and builders for quiz generation.
// Pure string assembly: identical inputs always yield byte-identical prompts.

use crate::quiz::models::GenerationRequest;

/// System prompt: JSON-only output grounded in the supplied sources.
pub const QUIZ_SYSTEM_PROMPT: &str = "\
You are a strict quiz JSON generator.

You must output ONLY valid JSON.
Do NOT include markdown.
Do NOT include explanations outside the JSON.
Do NOT include code fences.
Do NOT include commentary.

You must use ONLY information found in the provided files or SOURCE PACK.
If insufficient information exists, reduce the question_count and mention this in source_summary.

All math must use LaTeX delimiters:
Inline: \\( ... \\)
Block: \\[ ... \\]

Follow the exact schema provided.
Do not add extra properties.
Do not remove required properties.
Do not rename fields.
Keep explanations short and factual.
Ensure MCQ answer_index is a number referencing choices array.
Ensure matching pairs are unique.
Ensure fill_blank prompts contain '____'.
Return JSON only.";

/// User prompt template.
/// Replace: {quiz_type}, {question_count}, {difficulty}, then {schema} last.
pub const QUIZ_USER_PROMPT_TEMPLATE: &str = r#"Generate an exam-ready quiz using the source material.
Requested quizType: {quiz_type}
Requested questionCount: {question_count}
Requested difficulty: {difficulty}

CRITICAL TYPE RULES:
- The returned top-level field "quiz_type" must exactly equal "{quiz_type}".
- If quizType != "mixed", then ALL questions must have question.type == "{quiz_type}".
- If quizType == "mixed", allow mixture but keep it sensible.

COUNT RULES:
- question_count MUST equal questions.length.
- If there is insufficient material to generate the requested count, reduce question_count and return fewer questions.
- Mention any reduction in source_summary.

NO HALLUCINATIONS:
- Use ONLY source content from attached files or SOURCE PACK.
- Do not invent facts.

JSON-PARSING GUARANTEE:
- Entire response must be parseable as a single JSON document.
- No trailing commas.
- No comments.
- No extra text before or after JSON.

MCQ RULES:
- Provide >= 4 choices.
- Ensure answer_index is valid and points to the correct choice.
- Provide plausible distractors.

FILL BLANK RULES:
- Prompt must include ____ where blank is.
- answers[] contains accepted answers.

IDENTIFICATION RULES:
- answers[] contains accepted answers.

MATCHING RULES:
- Provide 4–10 pairs depending on requested questionCount.
- Ensure no repeated left or right.
- Keep pairs grounded in source.
- Explanation short.

MATH AND CODE RULES:
- Wrap math in LaTeX delimiters.
- For code in prompts, use triple backticks inside JSON string values.

Schema (follow exactly):
{schema}"#;

/// Label separating the user prompt from the extracted source text.
pub const SOURCE_PACK_HEADING: &str = "=== SOURCE PACK (EXTRACTED TEXT) ===";

pub fn build_system_prompt() -> String {
    QUIZ_SYSTEM_PROMPT.to_string()
}

pub fn build_user_prompt(request: &GenerationRequest, schema_text: &str) -> String {
    let difficulty = request
        .difficulty()
        .map(|d| d.as_str())
        .unwrap_or("not specified");

    QUIZ_USER_PROMPT_TEMPLATE
        .replace("{quiz_type}", request.quiz_type().as_str())
        .replace("{question_count}", &request.question_count().to_string())
        .replace("{difficulty}", difficulty)
        .replace("{schema}", schema_text)
}

/// The full user text sent to the provider: prompt followed by the labeled
/// source pack appendix.
pub fn assemble_user_text(user_prompt: &str, source_pack: &str) -> String {
    format!("{user_prompt}\n\n{SOURCE_PACK_HEADING}\n{source_pack}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::models::{Difficulty, QuizType};
    use crate::quiz::schema::quiz_json_schema_text;

    fn request(quiz_type: QuizType, count: u32, difficulty: Option<Difficulty>) -> GenerationRequest {
        GenerationRequest::new(quiz_type, count, difficulty).unwrap()
    }

    #[test]
    fn test_system_prompt_demands_json_only() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("output ONLY valid JSON"));
        assert!(prompt.contains("Do NOT include code fences."));
        assert!(prompt.contains("\\( ... \\)"));
        assert!(prompt.contains("'____'"));
    }

    #[test]
    fn test_user_prompt_embeds_request_shape() {
        let schema = quiz_json_schema_text();
        let prompt = build_user_prompt(&request(QuizType::FillBlank, 12, Some(Difficulty::Hard)), &schema);

        assert!(prompt.contains("Requested quizType: fill_blank"));
        assert!(prompt.contains("Requested questionCount: 12"));
        assert!(prompt.contains("Requested difficulty: hard"));
        assert!(prompt.contains("must exactly equal \"fill_blank\""));
        assert!(prompt.ends_with(&schema));
        assert!(!prompt.contains("{quiz_type}"));
    }

    #[test]
    fn test_unset_difficulty_is_reported_as_not_specified() {
        let prompt = build_user_prompt(&request(QuizType::Mixed, 3, None), "{}");
        assert!(prompt.contains("Requested difficulty: not specified"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let schema = quiz_json_schema_text();
        let req = request(QuizType::Matching, 5, Some(Difficulty::Easy));
        let a = assemble_user_text(&build_user_prompt(&req, &schema), "### FILE: a.txt (text/plain)\nx");
        let b = assemble_user_text(&build_user_prompt(&req, &schema), "### FILE: a.txt (text/plain)\nx");
        assert_eq!(a, b);
        assert_eq!(build_system_prompt(), build_system_prompt());
    }

    #[test]
    fn test_assembled_text_appends_labeled_source_pack() {
        let text = assemble_user_text("PROMPT", "SOURCE");
        assert_eq!(text, "PROMPT\n\n=== SOURCE PACK (EXTRACTED TEXT) ===\nSOURCE");
    }
}
