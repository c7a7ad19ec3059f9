use super::FormatParser;
use crate::application::ports::ParseError;
use crate::domain::entities::{ElementKind, NewElement};

/// Office formats have no native codec here; they degrade to best-effort
/// extraction of readable text runs emitted as `other` elements, which keeps
/// the pipeline moving instead of failing the document.
pub struct OfficeParser {
    min_run: usize,
}

const OFFICE_MIMES: [&str; 6] = [
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.ms-excel",
    "application/vnd.ms-powerpoint",
];

impl OfficeParser {
    pub fn new() -> Self {
        Self { min_run: 4 }
    }
}

impl Default for OfficeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatParser for OfficeParser {
    fn can_parse(&self, mime: &str) -> bool {
        OFFICE_MIMES.contains(&mime)
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let runs = readable_runs(bytes, self.min_run);
        if runs.is_empty() {
            return Err(ParseError::Failed(
                "no readable text in office document".to_string(),
            ));
        }
        Ok(vec![NewElement {
            ordinal: 0,
            kind: ElementKind::Other,
            page: None,
            level: None,
            text: runs.join(" "),
            table_markdown: None,
        }])
    }
}

/// Printable character runs of at least `min_run` word characters, with
/// markup noise filtered out.
fn readable_runs(bytes: &[u8], min_run: usize) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut runs = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() || c == ' ' || c == '\'' || c == '-' {
            current.push(c);
        } else if !current.trim().is_empty() {
            flush_run(&mut runs, &mut current, min_run);
        } else {
            current.clear();
        }
    }
    flush_run(&mut runs, &mut current, min_run);
    runs
}

fn flush_run(runs: &mut Vec<String>, current: &mut String, min_run: usize) {
    let cleaned = current.trim();
    let word_chars = cleaned.chars().filter(|c| c.is_alphanumeric()).count();
    // Single tokens are almost always markup identifiers, not prose.
    if word_chars >= min_run && cleaned.contains(' ') {
        runs.push(cleaned.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prose_runs_from_binary_noise() {
        let mut bytes = vec![0u8, 1, 2, 0xff];
        bytes.extend_from_slice(b"Quarterly revenue was strong");
        bytes.extend_from_slice(&[3, 4, 0xfe]);
        bytes.extend_from_slice(b"growth continued in Europe");
        bytes.push(0);

        let parser = OfficeParser::new();
        let elements = parser.parse(&bytes).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Other);
        assert!(elements[0].text.contains("Quarterly revenue"));
        assert!(elements[0].text.contains("growth continued"));
    }

    #[test]
    fn markup_identifiers_are_dropped() {
        let runs = readable_runs(b"<w:p><w:t>real words here</w:t></w:p>", 4);
        assert!(runs.iter().any(|r| r.contains("real words here")));
        assert!(!runs.iter().any(|r| r == "p" || r == "t"));
    }

    #[test]
    fn pure_binary_fails() {
        let parser = OfficeParser::new();
        assert!(parser.parse(&[0u8, 1, 2, 3, 0xff, 0xfe]).is_err());
    }
}
