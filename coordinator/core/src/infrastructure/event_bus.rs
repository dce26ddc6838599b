// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Status Channel for Round Events
//
// In-memory fan-out of round progress using a tokio broadcast channel.
// Publishing never waits on observers: each subscriber reads from a bounded
// ring buffer, and a subscriber that falls behind loses the oldest events.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::domain::events::RoundEvent;

/// Event bus for publishing and subscribing to round events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RoundEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified per-subscriber capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1024)
    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    /// Publish an event to all current subscribers. Never blocks.
    pub fn publish(&self, event: RoundEvent) {
        debug!(kind = event.kind(), "Publishing round event");

        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to round events");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe as a `Stream`; lag gaps are logged and skipped.
    pub fn subscribe_stream(&self) -> impl Stream<Item = RoundEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(n)) => {
                    warn!("Event stream subscriber lagged by {} events", n);
                    None
                }
            }
        })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all round events
pub struct EventReceiver {
    receiver: broadcast::Receiver<RoundEvent>,
}

impl EventReceiver {
    /// Receive the next event
    pub async fn recv(&mut self) -> Result<RoundEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<RoundEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::round::RoundId;
    use chrono::Utc;

    fn progress(received: usize) -> RoundEvent {
        RoundEvent::Progress {
            round_id: RoundId::new(),
            received,
            expected: 10,
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(RoundEvent::Reset { reset_at: Utc::now() });

        let received = receiver.recv().await.unwrap();
        assert!(matches!(received, RoundEvent::Reset { .. }));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(progress(1));

        // Both receivers should get the event
        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[test]
    fn test_publish_without_subscribers_does_not_fail() {
        let event_bus = EventBus::new(4);
        event_bus.publish(progress(1));
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[test]
    fn test_slow_subscriber_never_blocks_publisher() {
        let event_bus = EventBus::new(2);
        let mut slow = event_bus.subscribe();

        for i in 0..50 {
            event_bus.publish(progress(i));
        }

        assert!(matches!(slow.try_recv(), Err(EventBusError::Lagged(48))));
        match slow.try_recv().unwrap() {
            RoundEvent::Progress { received, .. } => assert_eq!(received, 48),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_skips_lag_gap() {
        let event_bus = EventBus::new(2);
        let stream = event_bus.subscribe_stream();
        tokio::pin!(stream);

        for i in 0..5 {
            event_bus.publish(progress(i));
        }

        match stream.next().await.unwrap() {
            RoundEvent::Progress { received, .. } => assert_eq!(received, 3),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
