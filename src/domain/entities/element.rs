use serde::{Deserialize, Serialize};

/// Typed, ordered piece of parsed document content. `ordinal` is the reading
/// sequence within the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: i64,
    pub document_id: i64,
    pub ordinal: i32,
    pub kind: ElementKind,
    pub page: Option<i32>,
    pub level: Option<i32>,
    pub text: String,
    pub table_markdown: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Heading,
    Paragraph,
    ListItem,
    Table,
    Code,
    Other,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Heading => "heading",
            ElementKind::Paragraph => "paragraph",
            ElementKind::ListItem => "list_item",
            ElementKind::Table => "table",
            ElementKind::Code => "code",
            ElementKind::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "heading" => Ok(ElementKind::Heading),
            "paragraph" => Ok(ElementKind::Paragraph),
            "list_item" => Ok(ElementKind::ListItem),
            "table" => Ok(ElementKind::Table),
            "code" => Ok(ElementKind::Code),
            "other" => Ok(ElementKind::Other),
            other => Err(format!("invalid element kind: {}", other)),
        }
    }
}

/// Parser output before persistence; ordinals are assigned in emit order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewElement {
    pub ordinal: i32,
    pub kind: ElementKind,
    pub page: Option<i32>,
    pub level: Option<i32>,
    pub text: String,
    pub table_markdown: Option<String>,
}

impl NewElement {
    pub fn heading(ordinal: i32, level: i32, text: impl Into<String>, page: Option<i32>) -> Self {
        Self {
            ordinal,
            kind: ElementKind::Heading,
            page,
            level: Some(level.clamp(1, 6)),
            text: text.into(),
            table_markdown: None,
        }
    }

    pub fn paragraph(ordinal: i32, text: impl Into<String>, page: Option<i32>) -> Self {
        Self {
            ordinal,
            kind: ElementKind::Paragraph,
            page,
            level: None,
            text: text.into(),
            table_markdown: None,
        }
    }

    pub fn table(ordinal: i32, markdown: impl Into<String>, page: Option<i32>) -> Self {
        let markdown = markdown.into();
        Self {
            ordinal,
            kind: ElementKind::Table,
            page,
            level: None,
            text: markdown.clone(),
            table_markdown: Some(markdown),
        }
    }
}
