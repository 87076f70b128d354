//! # Realtime Change Hub
//!
//! In-process change notifications for catalog, inventory and order tables.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Realtime Hub                                     │
//! │                                                                         │
//! │  Repositories (after commit)                                            │
//! │        │ publish(ChangeEvent)                                           │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ channels: (organization, table) ──► broadcast::Sender           │   │
//! │  └──────────────┬───────────────────────────────┬──────────────────┘   │
//! │                 ▼                               ▼                       │
//! │        ┌─────────────────┐             ┌─────────────────┐              │
//! │        │  Subscription   │             │  Subscription   │  one task    │
//! │        │  task + handler │             │  task + handler │  each        │
//! │        └─────────────────┘             └─────────────────┘              │
//! │                                                                         │
//! │  set_handler() swaps the callback, the channel and task stay put.      │
//! │  Dropping the Subscription aborts its task.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cava_core::ChangeKind;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

// =============================================================================
// Constants
// =============================================================================

/// Buffered events per channel before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Events
// =============================================================================

/// One row change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    pub organization_id: String,
    pub record_id: String,
    /// The new row, or the deleted row's key for deletes.
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    pub fn new(
        kind: ChangeKind,
        table: impl Into<String>,
        organization_id: impl Into<String>,
        record_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        ChangeEvent {
            kind,
            table: table.into(),
            organization_id: organization_id.into(),
            record_id: record_id.into(),
            payload,
        }
    }
}

/// Callback invoked for each event of a subscription.
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

type ChannelKey = (String, String);

// =============================================================================
// Hub
// =============================================================================

/// Shared handle to the change channels. Cheap to clone.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    channels: Arc<RwLock<HashMap<ChannelKey, broadcast::Sender<ChangeEvent>>>>,
}

impl fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeHub").finish_non_exhaustive()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender(&self, organization_id: &str, table: &str) -> broadcast::Sender<ChangeEvent> {
        let key = (organization_id.to_string(), table.to_string());

        if let Some(tx) = self.channels.read().await.get(&key) {
            return tx.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(key)
            .or_insert_with(|| {
                debug!(organization_id, table, "Opening realtime channel");
                broadcast::channel(CHANNEL_CAPACITY).0
            })
            .clone()
    }

    /// Starts delivering changes of `table` in `organization_id` to `handler`.
    ///
    /// Must be called inside a tokio runtime; the handler runs on a spawned
    /// task, one event at a time, in publish order.
    pub async fn subscribe<F>(&self, organization_id: &str, table: &str, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let mut rx = self.sender(organization_id, table).await.subscribe();
        let (handler_tx, handler_rx) = watch::channel::<ChangeHandler>(Arc::new(handler));

        let label = format!("{}/{}", organization_id, table);
        let task_label = label.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let handler = handler_rx.borrow().clone();
                        handler(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(channel = %task_label, skipped, "Subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        debug!(channel = %label, "Subscribed");
        Subscription {
            label,
            handler: handler_tx,
            task,
        }
    }

    /// Delivers `event` to every subscription on its (organization, table).
    ///
    /// Returns how many subscriptions received it. Zero is not an error.
    pub async fn publish(&self, event: ChangeEvent) -> usize {
        let tx = self.sender(&event.organization_id, &event.table).await;
        let record_id = event.record_id.clone();
        match tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(record_id = %record_id, "No realtime subscribers");
                0
            }
        }
    }

    /// Live subscriptions on a channel.
    pub async fn subscriber_count(&self, organization_id: &str, table: &str) -> usize {
        let key = (organization_id.to_string(), table.to_string());
        self.channels
            .read()
            .await
            .get(&key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A live subscription. Dropping it stops delivery.
pub struct Subscription {
    label: String,
    handler: watch::Sender<ChangeHandler>,
    task: JoinHandle<()>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.label)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

impl Subscription {
    /// Replaces the callback. Events published afterwards go to `handler`.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        self.handler.send_replace(Arc::new(handler));
        debug!(channel = %self.label, "Realtime handler replaced");
    }

    /// Stops delivery.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!(channel = %self.label, "Unsubscribed");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const ORG: &str = "00000000-0000-0000-0000-000000000001";

    fn inventory_event(record_id: &str) -> ChangeEvent {
        ChangeEvent::new(
            ChangeKind::Update,
            "inventory",
            ORG,
            record_id,
            json!({ "units": 10 }),
        )
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<(String, ChangeEvent)>,
    ) -> (String, ChangeEvent) {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_for_its_key() {
        let hub = RealtimeHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = hub
            .subscribe(ORG, "inventory", move |e| {
                let _ = tx.send(("first".to_string(), e));
            })
            .await;

        // Other table and other organization are not delivered.
        hub.publish(ChangeEvent::new(ChangeKind::Insert, "orders", ORG, "o-1", json!({})))
            .await;
        hub.publish(ChangeEvent::new(ChangeKind::Update, "inventory", "other-org", "x", json!({})))
            .await;
        assert_eq!(hub.publish(inventory_event("Solera/bottle")).await, 1);

        let (_, event) = recv(&mut rx).await;
        assert_eq!(event.record_id, "Solera/bottle");
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn test_set_handler_keeps_channel() {
        let hub = RealtimeHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first_tx = tx.clone();
        let sub = hub
            .subscribe(ORG, "inventory", move |e| {
                let _ = first_tx.send(("first".to_string(), e));
            })
            .await;

        hub.publish(inventory_event("a")).await;
        assert_eq!(recv(&mut rx).await.0, "first");

        sub.set_handler(move |e| {
            let _ = tx.send(("second".to_string(), e));
        });
        assert_eq!(hub.subscriber_count(ORG, "inventory").await, 1);

        hub.publish(inventory_event("b")).await;
        let (who, event) = recv(&mut rx).await;
        assert_eq!(who, "second");
        assert_eq!(event.record_id, "b");
    }

    #[tokio::test]
    async fn test_drop_stops_delivery() {
        let hub = RealtimeHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = hub
            .subscribe(ORG, "inventory", move |e| {
                let _ = tx.send(("first".to_string(), e));
            })
            .await;
        sub.unsubscribe();
        tokio::task::yield_now().await;

        hub.publish(inventory_event("a")).await;
        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .map(|msg| msg.is_none())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.publish(inventory_event("a")).await, 0);
        assert_eq!(hub.subscriber_count(ORG, "prices").await, 0);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(inventory_event("Polar/can")).unwrap();
        assert_eq!(json["kind"], "UPDATE");
        assert_eq!(json["organizationId"], ORG);
        assert_eq!(json["payload"]["units"], 10);
    }
}
