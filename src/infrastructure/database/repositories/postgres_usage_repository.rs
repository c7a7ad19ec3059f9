use async_trait::async_trait;
use diesel::prelude::*;

use super::db_err;
use crate::domain::repositories::{AnswerUsage, RepositoryError, UsageRepository};
use crate::infrastructure::database::schema::answer_logs;
use crate::infrastructure::database::{DbPool, get_connection};

#[derive(Debug, Insertable)]
#[diesel(table_name = answer_logs)]
struct NewAnswerLog {
    tenant_id: String,
    query: String,
    provider: String,
    model: String,
    in_tokens: Option<i32>,
    out_tokens: Option<i32>,
    latency_ms: i32,
}

pub struct PostgresUsageRepository {
    pool: DbPool,
}

impl PostgresUsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageRepository for PostgresUsageRepository {
    async fn record(&self, usage: AnswerUsage) -> Result<(), RepositoryError> {
        let mut conn = get_connection(&self.pool)?;
        diesel::insert_into(answer_logs::table)
            .values(NewAnswerLog {
                tenant_id: usage.tenant_id.as_str().to_string(),
                query: usage.query,
                provider: usage.provider,
                model: usage.model,
                in_tokens: usage.in_tokens,
                out_tokens: usage.out_tokens,
                latency_ms: usage.latency_ms,
            })
            .execute(&mut conn)
            .map_err(db_err)?;
        Ok(())
    }
}
