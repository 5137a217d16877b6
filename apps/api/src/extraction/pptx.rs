//! Slide text from a PresentationML (.pptx) package.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use zip::ZipArchive;

use super::ExtractionError;

static TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<a:t>(.*?)</a:t>").expect("valid text run regex"));

/// Slide parts are read in lexicographic name order. Runs on a slide are
/// joined with spaces; slides without any text are skipped; slides are
/// joined with newlines.
pub fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|name| is_slide_part(name))
        .map(str::to_string)
        .collect();
    slide_names.sort();

    let mut slides = Vec::with_capacity(slide_names.len());
    for name in &slide_names {
        let mut xml = String::new();
        archive.by_name(name)?.read_to_string(&mut xml)?;

        let runs: Vec<String> = TEXT_RUN
            .captures_iter(&xml)
            .filter_map(|c| c.get(1))
            .map(|m| decode_entities(m.as_str()))
            .collect();
        if !runs.is_empty() {
            slides.push(runs.join(" "));
        }
    }

    Ok(slides.join("\n"))
}

fn is_slide_part(name: &str) -> bool {
    name.starts_with("ppt/slides/slide") && name.ends_with(".xml")
}

fn decode_entities(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
