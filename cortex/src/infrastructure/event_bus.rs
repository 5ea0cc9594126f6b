// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Knowledge Events
//
// In-memory fan-out over a tokio broadcast channel. Events are lost on
// restart; the audit snapshots are the durable record of destructive changes.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::application::EventBus;
use crate::domain::KnowledgeEvent;

/// Broadcast event bus; clones share one channel
#[derive(Clone)]
pub struct BroadcastEventBus {
    sender: Arc<broadcast::Sender<KnowledgeEvent>>,
}

impl BroadcastEventBus {
    /// Capacity is how many events a slow subscriber may fall behind before
    /// it starts losing the oldest ones.
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

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events that mention one individual
    pub fn subscribe_individual(&self, uri: impl Into<String>) -> IndividualEventReceiver {
        IndividualEventReceiver {
            receiver: self.sender.subscribe(),
            uri: uri.into(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: KnowledgeEvent) -> Result<()> {
        debug!(event_type = event.event_type(), "Publishing event");

        // No subscribers is not a failure
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
        Ok(())
    }
}

fn map_recv(err: broadcast::error::RecvError) -> EventBusError {
    match err {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all knowledge events
pub struct EventReceiver {
    receiver: broadcast::Receiver<KnowledgeEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv)
    }

    pub fn try_recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
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

/// Receiver filtered to one individual URI
pub struct IndividualEventReceiver {
    receiver: broadcast::Receiver<KnowledgeEvent>,
    uri: String,
}

impl IndividualEventReceiver {
    pub async fn recv(&mut self) -> Result<KnowledgeEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv)?;
            if event.touches(&self.uri) {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventBusError {
    #[error("Event bus closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn created(uri: &str) -> KnowledgeEvent {
        KnowledgeEvent::IndividualCreated {
            uri: uri.to_string(),
            class_uri: "http://x/Organization".to_string(),
            label: "Acme".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = BroadcastEventBus::with_default_capacity();
        let mut receiver = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(created("http://x/a")).await.unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "individual_created");
        assert_eq!(receiver.try_recv().unwrap_err(), EventBusError::Empty);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = BroadcastEventBus::new(4);
        tokio_test::assert_ok!(bus.publish(created("http://x/a")).await);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_individual_filter() {
        let bus = BroadcastEventBus::new(16);
        let mut receiver = bus.subscribe_individual("http://x/b");

        bus.publish(created("http://x/a")).await.unwrap();
        bus.publish(KnowledgeEvent::IndividualsRemoved {
            uris: vec!["http://x/b".to_string()],
            triples_removed: 3,
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "individuals_removed");
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let bus = BroadcastEventBus::new(2);
        let mut receiver = bus.subscribe();
        for i in 0..5 {
            bus.publish(created(&format!("http://x/{}", i))).await.unwrap();
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(_))));
    }
}
