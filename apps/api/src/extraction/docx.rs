//! Raw text from a WordprocessingML (.docx) package.
//!
//! Only the main document part is read. Formatting, tables and images are
//! discarded; paragraphs are separated by a blank line.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut xml = String::new();
    {
        let mut part = archive
            .by_name(DOCUMENT_PART)
            .map_err(|_| ExtractionError::MissingPart(DOCUMENT_PART.to_string()))?;
        part.read_to_string(&mut xml)?;
    }

    document_text(&xml)
}

fn document_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;
    // Tabs and breaks only count inside a run; `w:pPr/w:tabs/w:tab` are tab stops.
    let mut run_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::Start(e) if e.name().as_ref() == b"w:r" => run_depth += 1,
            Event::Start(e) | Event::Empty(e) if run_depth > 0 => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => out.push_str(&e.unescape()?),
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:p" => out.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
