use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AggregateStatus, TenantId};

/// An uploaded artifact. Exclusive owner of its elements and chunks; deleting
/// a document cascades to everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub tenant_id: TenantId,
    pub name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub storage_uri: String,
    pub aggregate_status: AggregateStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new document; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: TenantId,
    pub name: String,
    pub mime: String,
    pub size_bytes: i64,
    pub storage_uri: String,
}
