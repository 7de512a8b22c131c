// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Mount Lifecycle Events
//
// Provides in-memory event streaming using tokio broadcast channels so the
// agent host can surface mount activity to its observability endpoints.
// In-memory only; events are lost on restart.

use crate::domain::events::MountEvent;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to mount lifecycle events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<MountEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given buffered capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a mount event to all subscribers
    pub fn publish_mount_event(&self, event: MountEvent) {
        debug!("Publishing event: {:?}", event);

        // send() reports how many receivers saw the message; zero listeners
        // is normal when nothing is streaming events.
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all mount events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<MountEvent>,
}

impl EventReceiver {
    /// Receive the next event (blocks until one is available)
    pub async fn recv(&mut self) -> Result<MountEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<MountEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => EventBusError::Lagged(n),
        })
    }
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("event bus closed")]
    Closed,

    #[error("receiver lagged by {0} events")]
    Lagged(u64),

    #[error("no event available")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mount::ContainerId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::with_default_capacity();
        let mut receiver = bus.subscribe();

        bus.publish_mount_event(MountEvent::VolumeMounted {
            container_id: ContainerId::new("c1"),
            volume_name: "db1".to_string(),
            volume_driver: "rexray".to_string(),
            host_path: "/var/lib/rexray/volumes/db1".to_string(),
            mounted_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            MountEvent::VolumeMounted { volume_name, .. } => assert_eq!(volume_name, "db1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::with_default_capacity();
        let mut receiver = bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::with_default_capacity();
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish_mount_event(MountEvent::ClaimsDropped {
            container_id: ContainerId::new("gone"),
            claim_count: 2,
            dropped_at: Utc::now(),
        });
    }
}
