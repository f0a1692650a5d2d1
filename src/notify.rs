// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

// Unread-count notifications
//
// Sessions report every observed change of their unread count to a
// NotificationSink. The event bus fans those reports out to any number of
// subscribers (UI windows, the CLI watcher).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Receiver of unread-count changes.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn unread_changed(&self, account_id: &str, count: u32);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadEvent {
    pub account_id: String,
    pub unread: u32,
    pub timestamp: DateTime<Utc>,
}

// Event subscription handle
pub struct Subscription {
    id: String,
    receiver: mpsc::UnboundedReceiver<UnreadEvent>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<UnreadEvent> {
        self.receiver.recv().await
    }
}

/// Broadcasts unread changes to every live subscriber.
#[derive(Clone, Default)]
pub struct UnreadEventBus {
    subscribers: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<UnreadEvent>>>>,
}

impl UnreadEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();

        self.subscribers.write().await.insert(id.clone(), tx);
        debug!("New unread subscription: {}", id);

        Subscription { id, receiver: rx }
    }

    pub async fn unsubscribe(&self, subscription_id: &str) {
        if self.subscribers.write().await.remove(subscription_id).is_some() {
            debug!("Unread subscription removed: {}", subscription_id);
        }
    }

    pub async fn publish(&self, event: UnreadEvent) {
        let subscribers = self.subscribers.read().await;
        let mut failed_subscribers = Vec::new();

        for (id, sender) in subscribers.iter() {
            if sender.send(event.clone()).is_err() {
                failed_subscribers.push(id.clone());
            }
        }

        // Receivers dropped without unsubscribing
        if !failed_subscribers.is_empty() {
            drop(subscribers);
            let mut subscribers = self.subscribers.write().await;
            for id in failed_subscribers {
                subscribers.remove(&id);
                warn!("Removed closed subscriber: {}", id);
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[async_trait]
impl NotificationSink for UnreadEventBus {
    async fn unread_changed(&self, account_id: &str, count: u32) {
        self.publish(UnreadEvent {
            account_id: account_id.to_string(),
            unread: count,
            timestamp: Utc::now(),
        })
        .await;
    }
}

/// Writes each change to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn unread_changed(&self, account_id: &str, count: u32) {
        info!("Account {}: {} unread", account_id, count);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn unread_changed(&self, _account_id: &str, _count: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives_change() {
        let bus = UnreadEventBus::new();
        let mut first = bus.subscribe().await;
        let mut second = bus.subscribe().await;
        assert_ne!(first.id(), second.id());

        bus.unread_changed("work", 4).await;

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.account_id, "work");
        assert_eq!(a.unread, 4);
        assert_eq!(b.unread, 4);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = UnreadEventBus::new();
        let kept = bus.subscribe().await;
        let dropped = bus.subscribe().await;
        drop(dropped);
        assert_eq!(bus.subscriber_count().await, 2);

        bus.unread_changed("home", 1).await;
        assert_eq!(bus.subscriber_count().await, 1);

        bus.unsubscribe(kept.id()).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[test]
    fn test_event_json_is_camel_case() {
        let event = UnreadEvent {
            account_id: "work".to_string(),
            unread: 2,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["accountId"], "work");
        assert_eq!(json["unread"], 2);
    }
}
