use scraper::{ElementRef, Html, Selector};

use super::{FormatParser, tables::rows_to_markdown};
use crate::application::ports::ParseError;
use crate::domain::entities::{ElementKind, NewElement};

/// HTML via a DOM walk over the content-bearing tags (h1..h6, p, li, pre,
/// table) in document order. Script and style subtrees never contribute text;
/// tables re-render as canonical markdown.
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

const CONTAINER_TAGS: [&str; 8] = ["p", "li", "pre", "table", "h1", "h2", "h3", "h4"];

impl FormatParser for HtmlParser {
    fn can_parse(&self, mime: &str) -> bool {
        matches!(mime, "text/html" | "application/xhtml+xml")
    }

    fn parse(&self, bytes: &[u8]) -> Result<Vec<NewElement>, ParseError> {
        let html = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&html);
        let mut elements: Vec<NewElement> = Vec::new();

        for node in document.root_element().descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            let tag = el.value().name();
            let ordinal = elements.len() as i32;

            match tag {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = tag[1..].parse::<i32>().unwrap_or(1);
                    let text = text_of(&el);
                    if !text.is_empty() {
                        elements.push(NewElement::heading(ordinal, level, text, None));
                    }
                }
                "p" => {
                    if nested_in_container(&el) {
                        continue;
                    }
                    let text = text_of(&el);
                    if !text.is_empty() {
                        elements.push(NewElement::paragraph(ordinal, text, None));
                    }
                }
                "li" => {
                    if nested_in_container(&el) {
                        continue;
                    }
                    let text = text_of(&el);
                    if !text.is_empty() {
                        elements.push(NewElement {
                            ordinal,
                            kind: ElementKind::ListItem,
                            page: None,
                            level: None,
                            text,
                            table_markdown: None,
                        });
                    }
                }
                "pre" => {
                    if nested_in_container(&el) {
                        continue;
                    }
                    let text: String = el.text().collect();
                    if !text.trim().is_empty() {
                        elements.push(NewElement {
                            ordinal,
                            kind: ElementKind::Code,
                            page: None,
                            level: None,
                            text: text.trim_end().to_string(),
                            table_markdown: None,
                        });
                    }
                }
                "table" => {
                    if nested_in_container(&el) {
                        continue;
                    }
                    let rows = table_rows(&el);
                    if !rows.is_empty() {
                        elements.push(NewElement::table(ordinal, rows_to_markdown(&rows), None));
                    }
                }
                _ => {}
            }
        }

        if elements.is_empty() {
            // Tag soup with no recognized structure: keep whatever text there
            // is as one best-effort element.
            let text = html2text::from_read(html.as_bytes(), 80);
            let text = text.trim().to_string();
            if !text.is_empty() {
                elements.push(NewElement {
                    ordinal: 0,
                    kind: ElementKind::Other,
                    page: None,
                    level: None,
                    text,
                    table_markdown: None,
                });
            }
        }
        Ok(elements)
    }
}

/// True when a recognized container higher up will already emit this node's
/// text (a p inside an li, an li inside a table cell, and so on).
fn nested_in_container(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CONTAINER_TAGS.contains(&a.value().name()))
}

fn text_of(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn table_rows(el: &ElementRef) -> Vec<Vec<String>> {
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("th, td").expect("static selector");
    el.select(&row_selector)
        .map(|row| {
            row.select(&cell_selector)
                .map(|cell| text_of(&cell))
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Vec<NewElement> {
        HtmlParser::new().parse(html.as_bytes()).unwrap()
    }

    #[test]
    fn structure_maps_to_elements() {
        let elements = parse(
            "<html><body><h1>Title</h1><p>Intro text.</p><ul><li>one</li><li>two</li></ul></body></html>",
        );
        assert_eq!(elements[0].kind, ElementKind::Heading);
        assert_eq!(elements[0].level, Some(1));
        assert_eq!(elements[1].kind, ElementKind::Paragraph);
        assert_eq!(elements[2].kind, ElementKind::ListItem);
        assert_eq!(elements.len(), 4);
    }

    #[test]
    fn scripts_do_not_leak_text() {
        let elements = parse("<body><script>var x = 1;</script><p>Visible.</p></body>");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].text, "Visible.");
    }

    #[test]
    fn paragraph_inside_list_item_is_not_doubled() {
        let elements = parse("<ul><li><p>only once</p></li></ul>");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::ListItem);
        assert_eq!(elements[0].text, "only once");
    }

    #[test]
    fn tables_become_markdown() {
        let elements = parse(
            "<table><tr><th>id</th><th>name</th></tr><tr><td>1</td><td>alpha</td></tr></table>",
        );
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Table);
        let md = elements[0].table_markdown.as_ref().unwrap();
        assert!(md.starts_with("| id | name |"));
        assert!(md.contains("| 1 | alpha |"));
    }

    #[test]
    fn unstructured_html_degrades_to_other() {
        let elements = parse("<div>bare text in a div</div>");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ElementKind::Other);
        assert!(elements[0].text.contains("bare text"));
    }
}
