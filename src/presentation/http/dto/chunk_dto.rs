use serde::Serialize;

use crate::domain::entities::Chunk;

/// Full chunk payload for citation expansion.
#[derive(Debug, Serialize)]
pub struct ChunkDto {
    pub id: i64,
    pub doc_id: i64,
    pub page: Option<i32>,
    pub text: String,
    pub header_path: Vec<String>,
}

impl From<Chunk> for ChunkDto {
    fn from(chunk: Chunk) -> Self {
        Self {
            id: chunk.id,
            doc_id: chunk.document_id,
            page: chunk.page,
            text: chunk.text,
            header_path: chunk.header_path,
        }
    }
}
