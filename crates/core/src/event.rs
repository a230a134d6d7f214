//! Domain event system — observe routing decisions without coupling.
//!
//! Events are published as a request moves through the pipeline and as
//! circuit breakers change state. Subscribers (dashboards, metrics
//! exporters, tests) react without the pipeline knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::circuit::CircuitState;
use crate::enhancement::EnhancementTier;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnhancementEvent {
    /// A request was scored and routed.
    RequestRouted {
        request_id: String,
        complexity: f64,
        tier: EnhancementTier,
        personas: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An enhancement call finished (any outcome).
    CallCompleted {
        request_id: String,
        server_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A server's circuit breaker changed state.
    CircuitTransitioned {
        server_id: String,
        from: CircuitState,
        to: CircuitState,
        timestamp: DateTime<Utc>,
    },

    /// A response envelope was produced.
    ResponseComposed {
        request_id: String,
        degraded: bool,
        frameworks: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<EnhancementEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: EnhancementEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EnhancementEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(EnhancementEvent::CircuitTransitioned {
            server_id: "sequential".into(),
            from: CircuitState::Closed,
            to: CircuitState::Open,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            EnhancementEvent::CircuitTransitioned { server_id, to, .. } => {
                assert_eq!(server_id, "sequential");
                assert_eq!(*to, CircuitState::Open);
            }
            _ => panic!("Expected CircuitTransitioned event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(EnhancementEvent::ResponseComposed {
            request_id: "r".into(),
            degraded: false,
            frameworks: 0,
            timestamp: Utc::now(),
        });
    }
}
