use super::{FormatParser, heading_level_of};
use crate::application::ports::ParseError;
use crate::domain::entities::{ElementKind, NewElement};

/// Plain text: blank-line separated blocks, a conservative heading heuristic,
/// and bullet/numbered lines as list items.
pub struct PlainTextParser;

impl PlainTextParser {
    pub fn new() -> Self {
        Self
    }

    pub fn elements_from_text(text: &str, page: Option<i32>) -> Vec<NewElement> {
        let mut elements = Vec::new();
        for block in text.split("\n\n") {
            let block = block.trim();
            if block.is_empty() {
                continue;
            }
            push_block(&mut elements, block, page);
        }
        elements
    }
}

impl Default for PlainTextParser {
    fn default() -> Self {
        Self::new()
    }
}

fn push_block(elements: &mut Vec<NewElement>, block: &str, page: Option<i32>) {
    let ordinal = elements.len() as i32;
    let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    if lines.len() == 1 {
        if let Some(level) = heading_level_of(lines[0]) {
            elements.push(NewElement::heading(ordinal, level, lines[0], page));
            return;
        }
    }

    if lines.iter().all(|l| is_list_line(l)) && !lines.is_empty() {
        for line in lines {
            let ordinal = elements.len() as i32;
            elements.push(NewElement {
                ordinal,
                kind: ElementKind::ListItem,
                page,
                level: None,
                text: strip_list_marker(line).to_string(),
                table_markdown: None,
            });
        }
        return;
    }

    elements.push(NewElement::paragraph(ordinal, lines.join(" "), page));
}

fn is_list_line(line: &str) -> bool {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return !rest.is_empty();
    }
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty()
        && line[digits.len()..].starts_with(". ")
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return rest;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    line[digits..].strip_prefix(". ").unwrap_or(line)
}

impl FormatParser for PlainTextParser {
    fn can_parse(&self, mime: &str) -> bool {
        matches!(mime, "text/plain" | "text/x-log")
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let text = String::from_utf8_lossy(bytes);
        let elements = Self::elements_from_text(&text, None);
        if elements.is_empty() && !text.trim().is_empty() {
            return Err(ParseError::Failed("no parseable content".to_string()));
        }
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_separate_paragraphs() {
        let elements =
            PlainTextParser::elements_from_text("First paragraph.\n\nSecond paragraph.", None);
        assert_eq!(elements.len(), 2);
        assert!(elements.iter().all(|e| e.kind == ElementKind::Paragraph));
    }

    #[test]
    fn caps_line_becomes_heading() {
        let elements =
            PlainTextParser::elements_from_text("OVERVIEW\n\nBody text follows here.", None);
        assert_eq!(elements[0].kind, ElementKind::Heading);
        assert_eq!(elements[0].level, Some(1));
        assert_eq!(elements[1].kind, ElementKind::Paragraph);
    }

    #[test]
    fn bullets_become_list_items() {
        let elements = PlainTextParser::elements_from_text("- first\n- second\n- third", None);
        assert_eq!(elements.len(), 3);
        assert!(elements.iter().all(|e| e.kind == ElementKind::ListItem));
        assert_eq!(elements[0].text, "first");
    }

    #[test]
    fn numbered_lists_are_detected() {
        assert!(is_list_line("1. step one"));
        assert!(is_list_line("12. step twelve"));
        assert!(!is_list_line("1.5 is a number"));
        assert_eq!(strip_list_marker("2. second"), "second");
    }

    #[test]
    fn ordinals_are_sequential() {
        let elements =
            PlainTextParser::elements_from_text("TITLE\n\npara one\n\n- a\n- b", None);
        let ordinals: Vec<i32> = elements.iter().map(|e| e.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }
}
