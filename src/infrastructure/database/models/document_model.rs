use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::entities::{Document, NewDocument};
use crate::domain::repositories::RepositoryError;
use crate::domain::value_objects::{AggregateStatus, TenantId};
use crate::infrastructure::database::schema::documents;

#[derive(Debug, Queryable, Identifiable, Selectable)]
#[diesel(table_name = documents)]
pub struct DocumentModel {
    pub id: i64,
    pub tenant_id: String,
    pub name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub storage_uri: String,
    pub aggregate_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocumentModel {
    pub tenant_id: String,
    pub name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub storage_uri: String,
    pub aggregate_status: String,
}

impl From<NewDocument> for NewDocumentModel {
    fn from(document: NewDocument) -> Self {
        Self {
            tenant_id: document.tenant_id.as_str().to_string(),
            name: document.name,
            mime: document.mime,
            size_bytes: document.size_bytes,
            storage_uri: document.storage_uri,
            aggregate_status: AggregateStatus::Uploaded.as_str().to_string(),
        }
    }
}

impl TryFrom<DocumentModel> for Document {
    type Error = RepositoryError;

    fn try_from(model: DocumentModel) -> Result<Self, Self::Error> {
        Ok(Document {
            id: model.id,
            tenant_id: TenantId::new(model.tenant_id).map_err(RepositoryError::Corrupt)?,
            name: model.name,
            mime: model.mime,
            size_bytes: model.size_bytes,
            storage_uri: model.storage_uri,
            aggregate_status: AggregateStatus::from_str(&model.aggregate_status)
                .map_err(RepositoryError::Corrupt)?,
            created_at: model.created_at,
        })
    }
}
