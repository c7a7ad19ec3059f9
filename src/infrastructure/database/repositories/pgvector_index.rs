//! The embeddings table doubles as the vector index: writes go through the
//! repository contract, cosine search through the `VectorIndex` port. The
//! tenant predicate joins through documents inside the query itself, so a
//! cross-tenant row can never appear in a result set.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel::sql_query;
use pgvector::{Vector, VectorExpressionMethods};

use super::db_err;
use crate::application::ports::{IndexError, ScoredChunk, VectorIndex};
use crate::domain::entities::Embedding;
use crate::domain::repositories::{EmbeddingRepository, RepositoryError};
use crate::domain::value_objects::{AggregateStatus, TenantId};
use crate::infrastructure::database::models::{EmbeddingModel, UpsertEmbeddingModel};
use crate::infrastructure::database::schema::{chunks, documents, embeddings};
use crate::infrastructure::database::{DbPool, get_connection};

pub struct PgVectorIndex {
    pool: DbPool,
}

impl PgVectorIndex {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingRepository for PgVectorIndex {
    async fn upsert_for_document(
        &self,
        document_id: i64,
        rows: Vec<(i64, Vector)>,
        provider_tag: &str,
        status: AggregateStatus,
    ) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let now = Utc::now();
        let models: Vec<UpsertEmbeddingModel> = rows
            .into_iter()
            .map(|(chunk_id, vector)| UpsertEmbeddingModel {
                chunk_id,
                dim: vector.as_slice().len() as i32,
                vector,
                provider_tag: provider_tag.to_string(),
                updated_at: now,
            })
            .collect();

        conn.transaction::<usize, DieselError, _>(|conn| {
            let mut written = 0;
            // Row-at-a-time keeps the conflict clause simple; batches are
            // already bounded by the embed batch size.
            for model in &models {
                written += diesel::insert_into(embeddings::table)
                    .values(model)
                    .on_conflict(embeddings::chunk_id)
                    .do_update()
                    .set((
                        embeddings::vector.eq(&model.vector),
                        embeddings::provider_tag.eq(&model.provider_tag),
                        embeddings::dim.eq(model.dim),
                        embeddings::updated_at.eq(model.updated_at),
                    ))
                    .execute(conn)?;
            }
            diesel::update(documents::table.filter(documents::id.eq(document_id)))
                .set(documents::aggregate_status.eq(status.as_str()))
                .execute(conn)?;
            Ok(written)
        })
        .map_err(db_err)
    }

    async fn find_for_chunk(&self, chunk_id: i64) -> Result<Option<Embedding>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let model = embeddings::table
            .find(chunk_id)
            .select(EmbeddingModel::as_select())
            .first::<EmbeddingModel>(&mut conn)
            .optional()
            .map_err(db_err)?;
        Ok(model.map(Embedding::from))
    }

    async fn count_for_document(&self, document_id: i64) -> Result<i64, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        embeddings::table
            .inner_join(chunks::table)
            .filter(chunks::document_id.eq(document_id))
            .count()
            .get_result(&mut conn)
            .map_err(db_err)
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn search(
        &self,
        tenant: &TenantId,
        query: &Vector,
        top_k: usize,
        probes: Option<i32>,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let mut conn =
            get_connection(&self.pool).map_err(|e| IndexError::Unavailable(e.to_string()))?;
        let query = query.clone();
        let tenant_id = tenant.as_str().to_string();

        let rows = conn
            .transaction::<Vec<(i64, f64)>, DieselError, _>(|conn| {
                if let Some(probes) = probes {
                    sql_query(format!("SET LOCAL ivfflat.probes = {}", probes.max(1)))
                        .execute(conn)?;
                }
                embeddings::table
                    .inner_join(chunks::table.inner_join(documents::table))
                    .filter(documents::tenant_id.eq(&tenant_id))
                    .select((
                        embeddings::chunk_id,
                        embeddings::vector.cosine_distance(query.clone()),
                    ))
                    .order((
                        embeddings::vector.cosine_distance(query.clone()).asc(),
                        embeddings::chunk_id.asc(),
                    ))
                    .limit(top_k as i64)
                    .load::<(i64, f64)>(conn)
            })
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(chunk_id, distance)| ScoredChunk {
                chunk_id,
                score: (1.0 - distance as f32).clamp(0.0, 1.0),
            })
            .collect())
    }
}
