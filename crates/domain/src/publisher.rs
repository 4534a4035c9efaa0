use std::sync::Arc;

use async_trait::async_trait;
use cqrs_es::{Aggregate, DomainEvent as _, EventEnvelope, Query};

use crate::event::DomainEvent;

/// Downstream event sink (notification, audit, reporting consumers).
/// Delivery is fire-and-forget from the core's point of view; retry and
/// backoff belong to the receiver, and consumers deduplicate by event id.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Relays committed events to an [`EventPublisher`].
///
/// Registered as a `Query` on the CQRS framework, so it runs only after the
/// events have been written to the log. A publish failure never fails the
/// command; the log remains the source of truth and a replay can re-deliver.
pub struct PublisherQuery {
    publisher: Arc<dyn EventPublisher>,
}

impl PublisherQuery {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<A: Aggregate> Query<A> for PublisherQuery {
    async fn dispatch(&self, aggregate_id: &str, events: &[EventEnvelope<A>]) {
        for envelope in events {
            let payload = match serde_json::to_string(&envelope.payload) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::error!(
                        "Failed to serialize {} event for {}: {}",
                        envelope.payload.event_type(),
                        aggregate_id,
                        err
                    );
                    continue;
                }
            };
            let metadata = serde_json::to_string(&envelope.metadata).unwrap_or_default();

            let event = DomainEvent::new(
                aggregate_id.to_string(),
                A::aggregate_type(),
                envelope.sequence,
                envelope.payload.event_type(),
                envelope.payload.event_version(),
                payload,
                metadata,
            );

            self.publisher.publish(event).await;
        }
    }
}
