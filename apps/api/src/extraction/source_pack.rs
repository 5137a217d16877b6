use super::ExtractedSection;

/// Upper bound, in characters, of the diagnostic preview.
pub const PREVIEW_CHARS: usize = 500;

const EMPTY_SECTION_PLACEHOLDER: &str = "[No extractable text found]";

/// The labeled corpus built from every uploaded document of one request.
/// Sections keep their submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePack {
    text: String,
}

impl SourcePack {
    pub fn assemble(sections: &[ExtractedSection]) -> Self {
        let text = sections
            .iter()
            .map(|s| {
                let body = if s.text.is_empty() {
                    EMPTY_SECTION_PLACEHOLDER
                } else {
                    s.text.as_str()
                };
                format!("### FILE: {} ({})\n{}", s.source_name, s.mime_type, body)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn preview(&self) -> String {
        self.text.chars().take(PREVIEW_CHARS).collect()
    }
}
