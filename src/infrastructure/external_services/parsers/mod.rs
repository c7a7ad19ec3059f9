//! Format-specific parsing strategies behind one mime dispatcher. Every
//! strategy emits the same ordered element stream; the chunker downstream is
//! format-agnostic.

pub mod delimited;
pub mod html;
pub mod markdown;
pub mod office;
pub mod pdf;
pub mod tables;
pub mod text;

pub use delimited::DelimitedParser;
pub use html::HtmlParser;
pub use markdown::MarkdownParser;
pub use office::OfficeParser;
pub use pdf::PdfParser;
pub use text::PlainTextParser;

use crate::application::ports::{DocumentParser, ParseError};
use crate::domain::entities::NewElement;

/// One format family. Strategies declare the mime types they handle.
pub trait FormatParser: Send + Sync {
    fn can_parse(&self, mime: &str) -> bool;

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError>;
}

/// Dispatches to the first strategy claiming the mime type.
pub struct CompositeParser {
    strategies: Vec<Box<dyn FormatParser>>,
}

impl CompositeParser {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(PdfParser::new()),
                Box::new(HtmlParser::new()),
                Box::new(MarkdownParser::new()),
                Box::new(DelimitedParser::comma()),
                Box::new(DelimitedParser::tab()),
                Box::new(OfficeParser::new()),
                Box::new(PlainTextParser::new()),
            ],
        }
    }

    fn strategy_for(&self, mime: &str) -> Option<&dyn FormatParser> {
        let mime = mime.split(';').next().unwrap_or(mime).trim();
        self.strategies
            .iter()
            .find(|s| s.can_parse(mime))
            .map(|s| s.as_ref())
    }

    pub fn parse_mime(&self, mime: &str, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        match self.strategy_for(mime) {
            Some(strategy) => strategy.parse(bytes),
            None => Err(ParseError::UnsupportedMime(mime.to_string())),
        }
    }

    pub fn supports(&self, mime: &str) -> bool {
        self.strategy_for(mime).is_some()
    }
}

impl Default for CompositeParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter carrying the document's mime through the `DocumentParser` port.
pub struct MimeBoundParser {
    inner: std::sync::Arc<CompositeParser>,
    mime: String,
}

impl MimeBoundParser {
    pub fn new(inner: std::sync::Arc<CompositeParser>, mime: impl Into<String>) -> Self {
        Self {
            inner,
            mime: mime.into(),
        }
    }
}

impl DocumentParser for MimeBoundParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        self.inner.parse_mime(&self.mime, bytes)
    }

    fn can_parse(&self, mime: &str) -> bool {
        self.inner.supports(mime)
    }
}

/// Conservative heading heuristic shared by the plain-text and PDF paths:
/// short, unterminated lines in all caps or title case.
pub(crate) fn heading_level_of(line: &str) -> Option<i32> {
    let line = line.trim();
    if line.is_empty() || line.len() > 80 {
        return None;
    }
    if line.ends_with(['.', ',', ';', ':', '!', '?']) {
        return None;
    }
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 2 {
        return None;
    }
    if letters.iter().all(|c| c.is_uppercase()) {
        return Some(1);
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() <= 8
        && words
            .iter()
            .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase() || c.is_numeric()))
    {
        return Some(2);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ElementKind;

    #[test]
    fn dispatches_by_mime() {
        let parser = CompositeParser::new();
        assert!(parser.supports("application/pdf"));
        assert!(parser.supports("text/markdown"));
        assert!(parser.supports("text/csv"));
        assert!(!parser.supports("video/mp4"));
    }

    #[test]
    fn mime_parameters_are_ignored() {
        let parser = CompositeParser::new();
        assert!(parser.supports("text/plain; charset=utf-8"));
    }

    #[test]
    fn unsupported_mime_is_an_error() {
        let parser = CompositeParser::new();
        let err = parser.parse_mime("video/mp4", b"data").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedMime(_)));
    }

    #[test]
    fn plain_text_flows_through_dispatch() {
        let parser = CompositeParser::new();
        let elements = parser
            .parse_mime("text/plain", b"Just a paragraph of text.")
            .unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Paragraph);
    }

    #[test]
    fn heading_heuristic() {
        assert_eq!(heading_level_of("INTRODUCTION"), Some(1));
        assert_eq!(heading_level_of("Getting Started"), Some(2));
        assert_eq!(heading_level_of("This is a normal sentence."), None);
        assert_eq!(heading_level_of(""), None);
    }
}
