use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

use super::db_err;
use crate::domain::entities::{Chunk, NewChunk};
use crate::domain::repositories::{ChunkRepository, RepositoryError};
use crate::domain::value_objects::{AggregateStatus, TenantId};
use crate::infrastructure::database::models::{ChunkModel, NewChunkModel};
use crate::infrastructure::database::schema::{chunks, documents};
use crate::infrastructure::database::{DbPool, get_connection};

pub struct PostgresChunkRepository {
    pool: DbPool,
}

impl PostgresChunkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkRepository for PostgresChunkRepository {
    async fn replace_for_document(
        &self,
        document_id: i64,
        new_chunks: Vec<NewChunk>,
        status: AggregateStatus,
    ) -> Result<Vec<Chunk>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<NewChunkModel> = new_chunks
            .into_iter()
            .map(|c| NewChunkModel::from_domain(document_id, c))
            .collect();

        let models = conn
            .transaction::<Vec<ChunkModel>, DieselError, _>(|conn| {
                // Embeddings ride along via ON DELETE CASCADE, which is what
                // makes a chunk re-run idempotent.
                diesel::delete(chunks::table.filter(chunks::document_id.eq(document_id)))
                    .execute(conn)?;
                let inserted = diesel::insert_into(chunks::table)
                    .values(&rows)
                    .returning(ChunkModel::as_returning())
                    .get_results::<ChunkModel>(conn)?;
                diesel::update(documents::table.filter(documents::id.eq(document_id)))
                    .set(documents::aggregate_status.eq(status.as_str()))
                    .execute(conn)?;
                Ok(inserted)
            })
            .map_err(db_err)?;

        models.into_iter().map(Chunk::try_from).collect()
    }

    async fn list_for_document(&self, document_id: i64) -> Result<Vec<Chunk>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let models = chunks::table
            .filter(chunks::document_id.eq(document_id))
            .order(chunks::ordinal.asc())
            .select(ChunkModel::as_select())
            .load::<ChunkModel>(&mut conn)
            .map_err(db_err)?;
        models.into_iter().map(Chunk::try_from).collect()
    }

    async fn get_by_ids(
        &self,
        tenant: &TenantId,
        ids: &[i64],
    ) -> Result<Vec<Chunk>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let models = chunks::table
            .inner_join(documents::table)
            .filter(chunks::id.eq_any(ids))
            .filter(documents::tenant_id.eq(tenant.as_str()))
            .select(ChunkModel::as_select())
            .load::<ChunkModel>(&mut conn)
            .map_err(db_err)?;
        models.into_iter().map(Chunk::try_from).collect()
    }

    async fn get_for_tenant(&self, tenant: &TenantId, id: i64) -> Result<Chunk, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let model = chunks::table
            .inner_join(documents::table)
            .filter(chunks::id.eq(id))
            .filter(documents::tenant_id.eq(tenant.as_str()))
            .select(ChunkModel::as_select())
            .first::<ChunkModel>(&mut conn)
            .optional()
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound {
                entity: "chunk",
                id,
            })?;
        Chunk::try_from(model)
    }
}
