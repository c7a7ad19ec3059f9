use async_trait::async_trait;
use diesel::prelude::*;

use super::db_err;
use crate::domain::entities::{Document, NewDocument};
use crate::domain::repositories::{DocumentRepository, RepositoryError};
use crate::domain::value_objects::{AggregateStatus, TenantId};
use crate::infrastructure::database::models::{DocumentModel, NewDocumentModel};
use crate::infrastructure::database::schema::documents::dsl as documents_dsl;
use crate::infrastructure::database::{DbPool, get_connection};

pub struct PostgresDocumentRepository {
    pool: DbPool,
}

impl PostgresDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn load(
        &self,
        id: i64,
        tenant: Option<&TenantId>,
    ) -> Result<Document, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = documents_dsl::documents
            .filter(documents_dsl::id.eq(id))
            .into_boxed();
        if let Some(tenant) = tenant {
            query = query.filter(documents_dsl::tenant_id.eq(tenant.as_str().to_string()));
        }
        let model = query
            .select(DocumentModel::as_select())
            .first::<DocumentModel>(&mut conn)
            .optional()
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound {
                entity: "document",
                id,
            })?;
        Document::try_from(model)
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let model = diesel::insert_into(documents_dsl::documents)
            .values(NewDocumentModel::from(document))
            .returning(DocumentModel::as_returning())
            .get_result::<DocumentModel>(&mut conn)
            .map_err(db_err)?;
        Document::try_from(model)
    }

    async fn find(&self, id: i64) -> Result<Document, RepositoryError> {
        self.load(id, None)
    }

    async fn find_for_tenant(
        &self,
        tenant: &TenantId,
        id: i64,
    ) -> Result<Document, RepositoryError> {
        self.load(id, Some(tenant))
    }

    async fn set_status(&self, id: i64, status: AggregateStatus) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let updated = diesel::update(documents_dsl::documents.filter(documents_dsl::id.eq(id)))
            .set(documents_dsl::aggregate_status.eq(status.as_str()))
            .execute(&mut conn)
            .map_err(db_err)?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "document",
                id,
            });
        }
        Ok(())
    }

    async fn set_storage_uri(&self, id: i64, uri: &str) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        diesel::update(documents_dsl::documents.filter(documents_dsl::id.eq(id)))
            .set(documents_dsl::storage_uri.eq(uri))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        diesel::delete(documents_dsl::documents.filter(documents_dsl::id.eq(id)))
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }

    async fn aggregate_status(&self, id: i64) -> Result<AggregateStatus, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let status: String = documents_dsl::documents
            .filter(documents_dsl::id.eq(id))
            .select(documents_dsl::aggregate_status)
            .first(&mut conn)
            .optional()
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound {
                entity: "document",
                id,
            })?;
        AggregateStatus::from_str(&status).map_err(RepositoryError::Corrupt)
    }
}
