use chrono::{DateTime, Utc};
use diesel::prelude::*;
use pgvector::Vector;

use crate::domain::entities::Embedding;
use crate::infrastructure::database::schema::embeddings;

#[derive(Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name = embeddings)]
#[diesel(primary_key(chunk_id))]
pub struct EmbeddingModel {
    pub chunk_id: i64,
    pub vector: Vector,
    pub provider_tag: String,
    pub dim: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = embeddings)]
pub struct UpsertEmbeddingModel {
    pub chunk_id: i64,
    pub vector: Vector,
    pub provider_tag: String,
    pub dim: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<EmbeddingModel> for Embedding {
    fn from(model: EmbeddingModel) -> Self {
        Embedding {
            chunk_id: model.chunk_id,
            vector: model.vector,
            provider_tag: model.provider_tag,
            dim: model.dim,
            updated_at: model.updated_at,
        }
    }
}
