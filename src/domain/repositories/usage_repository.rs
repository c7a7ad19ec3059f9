use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::domain::value_objects::TenantId;

/// Usage accounting for one answered query.
#[derive(Debug, Clone)]
pub struct AnswerUsage {
    pub tenant_id: TenantId,
    pub query: String,
    pub provider: String,
    pub model: String,
    pub in_tokens: Option<i32>,
    pub out_tokens: Option<i32>,
    pub latency_ms: i32,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn record(&self, usage: AnswerUsage) -> Result<(), RepositoryError>;
}
