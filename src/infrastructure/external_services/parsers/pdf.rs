use lopdf::Document;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::warn;

use super::{FormatParser, heading_level_of};
use crate::application::ports::ParseError;
use crate::domain::entities::{ElementKind, NewElement};

/// PDF text extraction with page-parallel decoding. Headings come from a
/// typographic heuristic; a page that fails to decode degrades to a single
/// `other` element so one bad page never sinks the document.
pub struct PdfParser {
    password: String,
}

impl PdfParser {
    pub fn new() -> Self {
        Self {
            password: String::new(),
        }
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatParser for PdfParser {
    fn can_parse(&self, mime: &str) -> bool {
        mime == "application/pdf"
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| ParseError::Failed(format!("corrupt pdf: {}", e)))?;

        if doc.is_encrypted() {
            doc.decrypt(&self.password)
                .map_err(|_| ParseError::Failed("encrypted pdf".to_string()))?;
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(ParseError::Failed("pdf has no pages".to_string()));
        }

        let mut extracted: Vec<(u32, Result<String, String>)> = page_numbers
            .into_par_iter()
            .map(|page| {
                let text = doc
                    .extract_text(&[page])
                    .map_err(|e| format!("page {}: {}", page, e));
                (page, text)
            })
            .collect();
        extracted.sort_by_key(|(page, _)| *page);

        let mut elements: Vec<NewElement> = Vec::new();
        for (page, result) in extracted {
            let page_no = Some(page as i32);
            match result {
                Ok(text) => push_page_elements(&mut elements, &text, page_no),
                Err(e) => {
                    warn!(page, error = %e, "pdf page failed to decode");
                    let ordinal = elements.len() as i32;
                    elements.push(NewElement {
                        ordinal,
                        kind: ElementKind::Other,
                        page: page_no,
                        level: None,
                        text: format!("[unreadable page {}]", page),
                        table_markdown: None,
                    });
                }
            }
        }

        if elements.is_empty() {
            return Err(ParseError::Failed(
                "no text could be extracted; the pdf may be image-only".to_string(),
            ));
        }
        Ok(elements)
    }
}

fn push_page_elements(elements: &mut Vec<NewElement>, text: &str, page: Option<i32>) {
    for block in split_blocks(text) {
        let ordinal = elements.len() as i32;
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() == 1 {
            if let Some(level) = heading_level_of(lines[0]) {
                elements.push(NewElement::heading(ordinal, level, lines[0], page));
                continue;
            }
        }
        if !lines.is_empty() {
            elements.push(NewElement::paragraph(ordinal, lines.join(" "), page));
        }
    }
}

/// `extract_text` flattens layout to newlines; paragraph breaks show up as
/// blank lines or short-line boundaries.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(trimmed);
        // A line far short of the column width usually ends the paragraph.
        if trimmed.len() < 35 && current.len() > 1 {
            blocks.push(current.join("\n"));
            current.clear();
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_split_on_blank_lines() {
        let blocks = split_blocks("line one of paragraph with enough width\n\nsecond paragraph");
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn short_line_terminates_block() {
        let blocks = split_blocks(
            "a long opening line of a pdf paragraph body text\nshort ending.\nnext paragraph starts here with more text",
        );
        assert!(blocks.len() >= 2);
        assert!(blocks[0].ends_with("short ending."));
    }

    #[test]
    fn page_elements_detect_headings() {
        let mut elements = Vec::new();
        push_page_elements(&mut elements, "CHAPTER ONE\n\nBody of the chapter goes here, long enough to be prose.", Some(1));
        assert_eq!(elements[0].kind, ElementKind::Heading);
        assert_eq!(elements[0].page, Some(1));
        assert_eq!(elements[1].kind, ElementKind::Paragraph);
    }

    #[test]
    fn garbage_bytes_fail_terminally() {
        let parser = PdfParser::new();
        assert!(matches!(
            parser.parse(b"not a pdf at all"),
            Err(ParseError::Failed(_))
        ));
    }
}
