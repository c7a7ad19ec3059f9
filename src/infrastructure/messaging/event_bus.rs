//! In-process tenant-topic bus over tokio broadcast channels. One channel per
//! `{tenant_id}.jobs` topic, created on demand. Delivery is at-most-once to
//! live subscribers: no replay, and a subscriber that falls behind loses the
//! oldest buffered events rather than ever blocking a publisher.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use crate::application::ports::{BusError, BusRecv, BusSubscription, EventBus};
use crate::domain::events::JobEvent;
use crate::domain::value_objects::TenantId;

pub struct BroadcastEventBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<JobEvent>>>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(8),
            topics: Mutex::new(HashMap::new()),
        })
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<JobEvent> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: &JobEvent) -> Result<(), BusError> {
        let topic = format!("{}.jobs", event.tenant_id);
        let mut topics = self.topics.lock().await;
        if let Some(sender) = topics.get(&topic) {
            // A send error only means nobody is listening right now; events
            // are advisory and the metadata store stays authoritative.
            if sender.send(event.clone()).is_err() && sender.receiver_count() == 0 {
                topics.remove(&topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, tenant: &TenantId) -> Result<Box<dyn BusSubscription>, BusError> {
        let sender = self.sender_for(&tenant.jobs_topic()).await;
        Ok(Box::new(BroadcastSubscription {
            receiver: sender.subscribe(),
        }))
    }
}

struct BroadcastSubscription {
    receiver: broadcast::Receiver<JobEvent>,
}

#[async_trait]
impl BusSubscription for BroadcastSubscription {
    async fn recv(&mut self) -> BusRecv {
        match self.receiver.recv().await {
            Ok(event) => BusRecv::Event(event),
            Err(broadcast::error::RecvError::Lagged(n)) => BusRecv::Lagged(n),
            Err(broadcast::error::RecvError::Closed) => BusRecv::Closed,
        }
    }
}
