use async_trait::async_trait;
use thiserror::Error;

use crate::domain::events::JobEvent;
use crate::domain::value_objects::TenantId;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// One pull from a subscription.
#[derive(Debug)]
pub enum BusRecv {
    Event(JobEvent),
    /// The subscriber fell behind and the oldest `n` events were dropped.
    /// Delivery is at-most-once; slow consumers lose events, never block
    /// publishers.
    Lagged(u64),
    Closed,
}

#[async_trait]
pub trait BusSubscription: Send {
    async fn recv(&mut self) -> BusRecv;
}

/// Tenant-topic pub/sub decoupling workers from WebSocket clients. Topics are
/// `{tenant_id}.jobs`; a subscriber for tenant A can never observe tenant B
/// payloads. Subscribers see only events published after they subscribe.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &JobEvent) -> Result<(), BusError>;

    async fn subscribe(&self, tenant: &TenantId) -> Result<Box<dyn BusSubscription>, BusError>;
}
