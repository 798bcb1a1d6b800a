//! Event system for registry operations
//!
//! Services emit an event after every committed write. The logging listener
//! turns them into the audit log.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Registry events emitted by services
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    FixtureCreated {
        id: i32,
        slug: String,
    },
    ManufacturerCreated {
        slug: String,
    },
    VendorCreated {
        slug: String,
        vendor_type: String,
    },
    VoteCast {
        entity_type: String,
        entity_id: i32,
        category: String,
        vote_type: String,
        upvotes: i32,
        downvotes: i32,
    },
    VoteRetracted {
        entity_type: String,
        entity_id: i32,
        category: String,
    },
    FixtureCertified {
        fixture_id: i32,
        threshold: f64,
        renewed: bool,
    },
    CertificationRejected {
        fixture_id: i32,
        all_above_threshold: bool,
        has_enough_votes: bool,
    },
    SeedLoaded {
        inserted: u64,
        skipped: u64,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RegistryEvent);
}

/// Event bus for broadcasting registry events
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: RegistryEvent) {
        trace!(event = ?event, "Emitting registry event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::VoteCast {
                entity_type,
                entity_id,
                category,
                vote_type,
                upvotes,
                downvotes,
            } => {
                debug!(
                    entity_type = %entity_type,
                    entity_id = entity_id,
                    category = %category,
                    vote = %vote_type,
                    upvotes = upvotes,
                    downvotes = downvotes,
                    "Vote cast"
                );
            }
            RegistryEvent::FixtureCertified {
                fixture_id,
                threshold,
                renewed,
            } => {
                info!(
                    fixture_id = fixture_id,
                    threshold = threshold,
                    renewed = renewed,
                    "Fixture certified"
                );
            }
            RegistryEvent::CertificationRejected {
                fixture_id,
                all_above_threshold,
                has_enough_votes,
            } => {
                debug!(
                    fixture_id = fixture_id,
                    all_above_threshold = all_above_threshold,
                    has_enough_votes = has_enough_votes,
                    "Certification rejected"
                );
            }
            _ => {
                trace!(event = ?event, "Registry event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(RegistryEvent::FixtureCreated {
            id: 3,
            slug: "mac-aura".into(),
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            RegistryEvent::FixtureCreated { id, slug } => {
                assert_eq!(id, 3);
                assert_eq!(slug, "mac-aura");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        bus.emit(RegistryEvent::ManufacturerCreated {
            slug: "robe".into(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
