use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::{FormatParser, tables::rows_to_markdown};
use crate::application::ports::ParseError;
use crate::domain::entities::{ElementKind, NewElement};

/// Markdown via the pulldown-cmark event stream, with tables and fenced code
/// enabled. Headings keep their levels; tables are re-rendered canonically.
pub struct MarkdownParser;

impl MarkdownParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatParser for MarkdownParser {
    fn can_parse(&self, mime: &str) -> bool {
        matches!(mime, "text/markdown" | "text/x-markdown")
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let text = String::from_utf8_lossy(bytes);
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        let parser = Parser::new_ext(&text, options);

        let mut elements: Vec<NewElement> = Vec::new();
        let mut state = State::default();

        for event in parser {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    state.heading_level = Some(heading_level_to_i32(level));
                    state.text.clear();
                }
                Event::End(TagEnd::Heading(_)) => {
                    let level = state.heading_level.take().unwrap_or(1);
                    let text = std::mem::take(&mut state.text);
                    if !text.trim().is_empty() {
                        let ordinal = elements.len() as i32;
                        elements.push(NewElement::heading(ordinal, level, text.trim(), None));
                    }
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    state.text.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let code = std::mem::take(&mut state.text);
                    if !code.trim().is_empty() {
                        let ordinal = elements.len() as i32;
                        elements.push(NewElement {
                            ordinal,
                            kind: ElementKind::Code,
                            page: None,
                            level: None,
                            text: code.trim_end().to_string(),
                            table_markdown: None,
                        });
                    }
                }
                Event::Start(Tag::Item) => {
                    state.in_item = true;
                    state.text.clear();
                }
                Event::End(TagEnd::Item) => {
                    state.in_item = false;
                    let item = std::mem::take(&mut state.text);
                    if !item.trim().is_empty() {
                        let ordinal = elements.len() as i32;
                        elements.push(NewElement {
                            ordinal,
                            kind: ElementKind::ListItem,
                            page: None,
                            level: None,
                            text: item.trim().to_string(),
                            table_markdown: None,
                        });
                    }
                }
                Event::Start(Tag::Table(_)) => {
                    state.table_rows.clear();
                }
                Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                    state.current_row.clear();
                }
                Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                    state.table_rows.push(std::mem::take(&mut state.current_row));
                }
                Event::Start(Tag::TableCell) => {
                    state.text.clear();
                }
                Event::End(TagEnd::TableCell) => {
                    state.current_row.push(std::mem::take(&mut state.text));
                }
                Event::End(TagEnd::Table) => {
                    let rows = std::mem::take(&mut state.table_rows);
                    if !rows.is_empty() {
                        let ordinal = elements.len() as i32;
                        elements.push(NewElement::table(ordinal, rows_to_markdown(&rows), None));
                    }
                }
                Event::Start(Tag::Paragraph) => {
                    if !state.in_item {
                        state.text.clear();
                    }
                }
                Event::End(TagEnd::Paragraph) => {
                    if !state.in_item {
                        let text = std::mem::take(&mut state.text);
                        if !text.trim().is_empty() {
                            let ordinal = elements.len() as i32;
                            elements.push(NewElement::paragraph(ordinal, text.trim(), None));
                        }
                    }
                }
                Event::Text(t) => state.text.push_str(&t),
                Event::Code(c) => {
                    state.text.push('`');
                    state.text.push_str(&c);
                    state.text.push('`');
                }
                Event::SoftBreak | Event::HardBreak => state.text.push(' '),
                _ => {}
            }
        }

        Ok(elements)
    }
}

#[derive(Default)]
struct State {
    text: String,
    heading_level: Option<i32>,
    in_item: bool,
    table_rows: Vec<Vec<String>>,
    current_row: Vec<String>,
}

fn heading_level_to_i32(level: HeadingLevel) -> i32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(md: &str) -> Vec<NewElement> {
        MarkdownParser::new().parse(md.as_bytes()).unwrap()
    }

    #[test]
    fn headings_keep_levels() {
        let elements = parse("# Top\n\n## Nested\n\nBody text.");
        assert_eq!(elements[0].kind, ElementKind::Heading);
        assert_eq!(elements[0].level, Some(1));
        assert_eq!(elements[1].level, Some(2));
        assert_eq!(elements[2].kind, ElementKind::Paragraph);
    }

    #[test]
    fn code_fences_become_code_elements() {
        let elements = parse("```rust\nfn main() {}\n```");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Code);
        assert!(elements[0].text.contains("fn main"));
    }

    #[test]
    fn list_items_are_individual_elements() {
        let elements = parse("- alpha\n- beta\n- gamma");
        assert_eq!(elements.len(), 3);
        assert!(elements.iter().all(|e| e.kind == ElementKind::ListItem));
        assert_eq!(elements[1].text, "beta");
    }

    #[test]
    fn tables_are_canonical_markdown() {
        let elements = parse("| id | name |\n| --- | --- |\n| 1 | alpha |\n| 2 | beta |");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Table);
        let md = elements[0].table_markdown.as_ref().unwrap();
        assert!(md.starts_with("| id | name |"));
        assert!(md.contains("| 1 | alpha |"));
    }

    #[test]
    fn inline_code_is_preserved_in_text() {
        let elements = parse("Call `embed()` to start.");
        assert_eq!(elements[0].text, "Call `embed()` to start.");
    }

    #[test]
    fn reading_order_is_preserved() {
        let elements = parse("# One\n\npara\n\n## Two\n\n- item");
        let kinds: Vec<ElementKind> = elements.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Heading,
                ElementKind::Paragraph,
                ElementKind::Heading,
                ElementKind::ListItem
            ]
        );
    }
}
