//! Subscription registry with per-subscriber delivery queues.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::select_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tracing::debug;

use crate::observability::metrics;
use crate::store::Resource;

/// How a published record is handed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Each record goes to exactly one eligible subscriber, round-robin.
    #[default]
    Queue,
    /// Each record goes to every eligible subscriber.
    Broadcast,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("propagation hub is closed")]
    Closed,
}

type Target = (u64, mpsc::Sender<Resource>);

struct SubscriberEntry {
    resource_id: String,
    tx: mpsc::Sender<Resource>,
}

/// Registry of active subscriptions.
pub struct PropagationHub {
    subscribers: DashMap<u64, SubscriberEntry>,
    next_id: AtomicU64,
    cursor: AtomicUsize,
    /// Signalled whenever a subscriber registers.
    changed: Notify,
    closed: watch::Sender<bool>,
    published: AtomicU64,
    mode: DeliveryMode,
    filter_by_id: bool,
    capacity: usize,
}

impl PropagationHub {
    pub fn new(mode: DeliveryMode, filter_by_id: bool, capacity: usize) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            cursor: AtomicUsize::new(0),
            changed: Notify::new(),
            closed,
            published: AtomicU64::new(0),
            mode,
            filter_by_id,
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber for `resource_id`. An empty id matches everything.
    pub fn subscribe(self: &Arc<Self>, resource_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(
            id,
            SubscriberEntry {
                resource_id: resource_id.to_string(),
                tx,
            },
        );
        metrics::set_active_subscriptions(self.subscribers.len());
        debug!(subscription_id = id, resource_id = %resource_id, "Subscription registered");
        self.changed.notify_waiters();

        Subscription {
            id,
            resource_id: resource_id.to_string(),
            rx,
            closed: self.closed.subscribe(),
            hub: Arc::clone(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        if self.subscribers.remove(&id).is_some() {
            metrics::set_active_subscriptions(self.subscribers.len());
            debug!(subscription_id = id, "Subscription removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Records successfully handed to at least one subscriber.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wake blocked publishers with [`PublishError::Closed`] and end all subscriptions.
    pub fn close(&self) {
        self.closed.send_replace(true);
        self.changed.notify_waiters();
    }

    fn is_eligible(&self, entry: &SubscriberEntry, resource: &Resource) -> bool {
        !self.filter_by_id || entry.resource_id.is_empty() || entry.resource_id == resource.id
    }

    /// Eligible subscribers in delivery order.
    fn targets(&self, resource: &Resource) -> Vec<Target> {
        let mut targets: Vec<_> = self
            .subscribers
            .iter()
            .filter(|e| self.is_eligible(e.value(), resource))
            .map(|e| (*e.key(), e.value().tx.clone()))
            .collect();
        targets.sort_by_key(|(id, _)| *id);
        if self.mode == DeliveryMode::Queue && !targets.is_empty() {
            let start = self.cursor.fetch_add(1, Ordering::Relaxed) % targets.len();
            targets.rotate_left(start);
        }
        targets
    }

    /// Hand a record to subscribers, waiting until one is available.
    ///
    /// In `Queue` mode a full subscriber never holds the record back while
    /// another eligible subscriber has room.
    ///
    /// Returns the number of subscribers that received the record.
    pub async fn publish(&self, resource: Resource) -> Result<usize, PublishError> {
        let started = Instant::now();
        let mut closed = self.closed.subscribe();

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if *closed.borrow() {
                return Err(PublishError::Closed);
            }

            let targets = self.targets(&resource);
            if targets.is_empty() {
                debug!(resource_id = %resource.id, "No eligible subscriber, waiting");
                tokio::select! {
                    _ = &mut notified => {}
                    _ = closed.wait_for(|c| *c) => return Err(PublishError::Closed),
                }
                continue;
            }

            let delivered = match self.mode {
                DeliveryMode::Broadcast => self.broadcast(&resource, targets).await,
                DeliveryMode::Queue => match self.offer(&resource, targets) {
                    Ok(()) => 1,
                    // Every target dropped its receiver; look again.
                    Err(full) if full.is_empty() => continue,
                    Err(full) => {
                        debug!(resource_id = %resource.id, subscribers = full.len(), "All subscriber queues full, waiting");
                        let reservations = full.iter().map(|(id, tx)| {
                            let id = *id;
                            Box::pin(async move { (id, tx.reserve().await) })
                        });
                        tokio::select! {
                            ((id, reserved), _, _) = select_all(reservations) => match reserved {
                                Ok(permit) => {
                                    permit.send(resource.clone());
                                    1
                                }
                                Err(_) => {
                                    self.unsubscribe(id);
                                    continue;
                                }
                            },
                            _ = &mut notified => continue,
                            _ = closed.wait_for(|c| *c) => return Err(PublishError::Closed),
                        }
                    }
                },
            };

            if delivered > 0 {
                self.published.fetch_add(1, Ordering::Relaxed);
                metrics::record_publish_wait(started);
                debug!(resource_id = %resource.id, receivers = delivered, "Record published");
                return Ok(delivered);
            }
        }
    }

    /// Give the record to the first target with room.
    ///
    /// On failure returns the targets whose queues were full; closed ones are
    /// unregistered.
    fn offer(&self, resource: &Resource, targets: Vec<Target>) -> Result<(), Vec<Target>> {
        let mut full = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(resource.clone()) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(_)) => full.push((id, tx)),
                Err(TrySendError::Closed(_)) => self.unsubscribe(id),
            }
        }
        Err(full)
    }

    async fn broadcast(&self, resource: &Resource, targets: Vec<Target>) -> usize {
        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.send(resource.clone()).await {
                Ok(()) => delivered += 1,
                // Receiver dropped between lookup and send.
                Err(_) => self.unsubscribe(id),
            }
        }
        delivered
    }
}

/// Receiving side of one registered subscriber. Unregisters on drop.
pub struct Subscription {
    id: u64,
    resource_id: String,
    rx: mpsc::Receiver<Resource>,
    closed: watch::Receiver<bool>,
    hub: Arc<PropagationHub>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Wait for the next record. `None` once the hub is closed.
    pub async fn recv(&mut self) -> Option<Resource> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            item = self.rx.recv() => item,
            _ = self.closed.wait_for(|c| *c) => None,
        }
    }

    pub fn try_recv(&mut self) -> Option<Resource> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn resource(id: &str, generation: i64) -> Resource {
        Resource::new(id, "cluster-a", json!({"kind": "ConfigMap"}), generation)
    }

    fn hub(mode: DeliveryMode, filter_by_id: bool) -> Arc<PropagationHub> {
        Arc::new(PropagationHub::new(mode, filter_by_id, 1))
    }

    #[tokio::test]
    async fn test_publish_blocks_without_subscribers() {
        let hub = hub(DeliveryMode::Queue, false);
        let result = tokio::time::timeout(Duration::from_millis(100), hub.publish(resource("r1", 1))).await;
        assert!(result.is_err(), "publish should wait for a subscriber");
        assert_eq!(hub.published(), 0);
    }

    #[tokio::test]
    async fn test_publish_resumes_when_subscriber_appears() {
        let hub = hub(DeliveryMode::Queue, false);
        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.publish(resource("r1", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publisher.is_finished());

        let mut sub = hub.subscribe("");
        let received = sub.recv().await.unwrap();
        assert_eq!(received.id, "r1");
        assert_eq!(publisher.await.unwrap(), Ok(1));
    }

    #[tokio::test]
    async fn test_records_arrive_in_publish_order() {
        let hub = hub(DeliveryMode::Queue, false);
        let mut sub = hub.subscribe("");
        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move {
                hub.publish(resource("r1", 1)).await.unwrap();
                hub.publish(resource("r2", 1)).await.unwrap();
            })
        };
        assert_eq!(sub.recv().await.unwrap().id, "r1");
        assert_eq!(sub.recv().await.unwrap().id, "r2");
        publisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_mode_delivers_once() {
        let hub = hub(DeliveryMode::Queue, false);
        let mut a = hub.subscribe("");
        let mut b = hub.subscribe("");

        hub.publish(resource("r1", 1)).await.unwrap();
        hub.publish(resource("r2", 1)).await.unwrap();

        let mut ids: Vec<String> = [a.try_recv(), a.try_recv(), b.try_recv(), b.try_recv()]
            .into_iter()
            .flatten()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_mode_skips_full_subscriber() {
        let hub = hub(DeliveryMode::Queue, false);
        let _busy = hub.subscribe("");
        let mut idle = hub.subscribe("");

        // One record each; the busy subscriber never drains.
        hub.publish(resource("r1", 1)).await.unwrap();
        hub.publish(resource("r2", 1)).await.unwrap();
        let mut idle_seen = vec![idle.try_recv().unwrap().id];

        for id in ["r3", "r4", "r5"] {
            let published =
                tokio::time::timeout(Duration::from_millis(300), hub.publish(resource(id, 1))).await;
            assert_eq!(published, Ok(Ok(1)), "{id} held back by a full subscriber");
            idle_seen.push(idle.try_recv().unwrap().id);
        }
        assert_eq!(idle_seen.len(), 4);
        assert!(idle_seen.ends_with(&["r3".to_string(), "r4".to_string(), "r5".to_string()]));
    }

    #[tokio::test]
    async fn test_queue_mode_waits_for_first_free_subscriber() {
        let hub = hub(DeliveryMode::Queue, false);
        let mut a = hub.subscribe("");
        let mut b = hub.subscribe("");
        hub.publish(resource("r1", 1)).await.unwrap();
        hub.publish(resource("r2", 1)).await.unwrap();

        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.publish(resource("r3", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publisher.is_finished(), "every queue is full");

        let first_b = b.recv().await.unwrap();
        assert_eq!(publisher.await.unwrap(), Ok(1));
        assert_eq!(b.try_recv().unwrap().id, "r3");
        assert_ne!(first_b.id, "r3");
        assert!(a.try_recv().is_some());
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_broadcast_mode_fans_out() {
        let hub = hub(DeliveryMode::Broadcast, false);
        let mut a = hub.subscribe("");
        let mut b = hub.subscribe("");

        assert_eq!(hub.publish(resource("r1", 1)).await, Ok(2));
        assert_eq!(a.try_recv().unwrap().id, "r1");
        assert_eq!(b.try_recv().unwrap().id, "r1");
    }

    #[tokio::test]
    async fn test_filter_by_id_skips_other_watchers() {
        let hub = hub(DeliveryMode::Broadcast, true);
        let mut other = hub.subscribe("r2");

        let blocked = tokio::time::timeout(Duration::from_millis(50), hub.publish(resource("r1", 1))).await;
        assert!(blocked.is_err());

        let mut matching = hub.subscribe("r1");
        assert_eq!(hub.publish(resource("r1", 2)).await, Ok(1));
        assert_eq!(matching.try_recv().unwrap().resource_generation_id, 2);
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_unregistered() {
        let hub = hub(DeliveryMode::Queue, false);
        let sub = hub.subscribe("");
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_releases_publishers_and_subscribers() {
        let hub = hub(DeliveryMode::Queue, false);
        let publisher = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.publish(resource("r1", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        hub.close();
        assert_eq!(publisher.await.unwrap(), Err(PublishError::Closed));

        let mut sub = hub.subscribe("");
        assert!(sub.recv().await.is_none());
    }
}
