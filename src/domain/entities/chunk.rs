use serde::{Deserialize, Serialize};

/// The unit of retrieval: a bounded contiguous text span carved from parsed
/// elements, carrying the heading breadcrumbs active at its start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub ordinal: i32,
    pub page: Option<i32>,
    pub token_count: i32,
    pub text: String,
    pub header_path: Vec<String>,
    pub is_table: bool,
}

impl Chunk {
    /// Breadcrumbs rendered for prompts and match payloads.
    pub fn breadcrumb_line(&self) -> String {
        self.header_path.join(" > ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub ordinal: i32,
    pub page: Option<i32>,
    pub token_count: i32,
    pub text: String,
    pub header_path: Vec<String>,
    pub is_table: bool,
}
