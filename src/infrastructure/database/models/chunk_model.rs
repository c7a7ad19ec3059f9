use diesel::prelude::*;

use crate::domain::entities::{Chunk, NewChunk};
use crate::domain::repositories::RepositoryError;
use crate::infrastructure::database::schema::chunks;

#[derive(Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name = chunks)]
pub struct ChunkModel {
    pub id: i64,
    pub document_id: i64,
    pub ordinal: i32,
    pub page: Option<i32>,
    pub token_count: i32,
    pub text: String,
    pub header_path: serde_json::Value,
    pub is_table: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = chunks)]
pub struct NewChunkModel {
    pub document_id: i64,
    pub ordinal: i32,
    pub page: Option<i32>,
    pub token_count: i32,
    pub text: String,
    pub header_path: serde_json::Value,
    pub is_table: bool,
}

impl NewChunkModel {
    pub fn from_domain(document_id: i64, chunk: NewChunk) -> Self {
        Self {
            document_id,
            ordinal: chunk.ordinal,
            page: chunk.page,
            token_count: chunk.token_count,
            text: chunk.text,
            header_path: serde_json::Value::from(chunk.header_path),
            is_table: chunk.is_table,
        }
    }
}

impl TryFrom<ChunkModel> for Chunk {
    type Error = RepositoryError;

    fn try_from(model: ChunkModel) -> Result<Self, Self::Error> {
        let header_path: Vec<String> = serde_json::from_value(model.header_path)
            .map_err(|e| RepositoryError::Corrupt(format!("header_path: {}", e)))?;
        Ok(Chunk {
            id: model.id,
            document_id: model.document_id,
            ordinal: model.ordinal,
            page: model.page,
            token_count: model.token_count,
            text: model.text,
            header_path,
            is_table: model.is_table,
        })
    }
}
