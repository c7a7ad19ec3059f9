use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::entities::{Element, NewElement};
use crate::domain::value_objects::AggregateStatus;

#[async_trait]
pub trait ElementRepository: Send + Sync {
    /// Replace the document's elements and advance its aggregate status in
    /// one transaction. Replacing (not appending) makes re-parse idempotent.
    async fn replace_for_document(
        &self,
        document_id: i64,
        elements: Vec<NewElement>,
        status: AggregateStatus,
    ) -> Result<usize, RepositoryError>;

    async fn list_for_document(&self, document_id: i64) -> Result<Vec<Element>, RepositoryError>;
}
