//! # Event Publisher
//!
//! Components publish `RegistryEvent`s after a commit; dashboards and
//! tests subscribe with a filter.

use crate::events::{EventFilter, RegistryEvent};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Outbound port every component publishes through.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Returns the number of active subscribers that received the event.
    /// Publishing never fails: with no subscribers the event is dropped.
    async fn publish(&self, event: RegistryEvent) -> usize;

    /// Events published since construction.
    fn events_published(&self) -> u64;
}

/// Broadcast bus shared by all components of one registry process.
///
/// A slow subscriber lags and skips events; publishers never block.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<RegistryEvent>,
    events_published: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscriber before it lags.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            events_published: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, project = ?filter.project, "New subscription created");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Same as `subscribe`, as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: RegistryEvent) -> usize {
        let topic = event.topic();
        let source = event.source_component();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(topic = ?topic, source, receivers, "Event published");
                receivers
            }
            Err(_) => {
                debug!(topic = ?topic, source, "Event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
