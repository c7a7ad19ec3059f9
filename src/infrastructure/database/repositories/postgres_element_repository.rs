use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

use super::db_err;
use crate::domain::entities::{Element, NewElement};
use crate::domain::repositories::{ElementRepository, RepositoryError};
use crate::domain::value_objects::AggregateStatus;
use crate::infrastructure::database::models::{ElementModel, NewElementModel};
use crate::infrastructure::database::schema::{documents, elements};
use crate::infrastructure::database::{DbPool, get_connection};

pub struct PostgresElementRepository {
    pool: DbPool,
}

impl PostgresElementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ElementRepository for PostgresElementRepository {
    async fn replace_for_document(
        &self,
        document_id: i64,
        new_elements: Vec<NewElement>,
        status: AggregateStatus,
    ) -> Result<usize, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let rows: Vec<NewElementModel> = new_elements
            .into_iter()
            .map(|e| NewElementModel::from_domain(document_id, e))
            .collect();

        conn.transaction::<usize, DieselError, _>(|conn| {
            diesel::delete(elements::table.filter(elements::document_id.eq(document_id)))
                .execute(conn)?;
            let inserted = diesel::insert_into(elements::table)
                .values(&rows)
                .execute(conn)?;
            diesel::update(documents::table.filter(documents::id.eq(document_id)))
                .set(documents::aggregate_status.eq(status.as_str()))
                .execute(conn)?;
            Ok(inserted)
        })
        .map_err(db_err)
    }

    async fn list_for_document(&self, document_id: i64) -> Result<Vec<Element>, RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        let models = elements::table
            .filter(elements::document_id.eq(document_id))
            .order(elements::ordinal.asc())
            .select(ElementModel::as_select())
            .load::<ElementModel>(&mut conn)
            .map_err(db_err)?;
        models.into_iter().map(Element::try_from).collect()
    }
}
