//! Routing engine
//!
//! Resolves which connections receive each event. Owns no state: it reads
//! the registries, copies out the target handles, releases the locks and
//! only then delivers.
//!
//! Control operations follow a targeted-else-broadcast policy. With a
//! producer id the event goes to exactly that producer (or nowhere, if it
//! is not registered); without one it goes to every registered producer.
//! There is no partial fan-out.
//!
//! Snapshot fan-out and watch replay share one ordering lock, so a consumer
//! that starts watching mid-push sees the replay and the push in the order
//! they were stored and never ends on an older capture.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::connection::{deliver_all, ConnectionHandle, ConnectionId};
use crate::error::ValidationError;
use crate::protocol::OutboundEvent;
use crate::registry::{ConsumerRegistry, ProducerId, ProducerRegistry, RegistryError, Snapshot};

/// Routes snapshots to watchers and control events to producers
#[derive(Clone)]
pub struct Router {
    producers: Arc<ProducerRegistry>,
    consumers: Arc<ConsumerRegistry>,
    fanout: Arc<Mutex<()>>,
}

impl Router {
    pub fn new(producers: Arc<ProducerRegistry>, consumers: Arc<ConsumerRegistry>) -> Self {
        Self {
            producers,
            consumers,
            fanout: Arc::new(Mutex::new(())),
        }
    }

    /// Store a producer's capture and forward it to its watchers
    ///
    /// `from` is the connection that pushed it. Returns the number of
    /// consumers the update was queued for. Updates for unknown producers,
    /// or from a connection that no longer owns the producer id, are dropped
    /// and reach nobody.
    pub async fn on_snapshot_update(
        &self,
        producer_id: &ProducerId,
        from: ConnectionId,
        snapshot: Snapshot,
    ) -> usize {
        let _order = self.fanout.lock().await;

        if !self
            .producers
            .update_snapshot(producer_id, from, snapshot.clone())
            .await
        {
            return 0;
        }

        let watchers = self.consumers.list_watching(producer_id).await;
        let delivered = deliver_all(&watchers, &OutboundEvent::ScreenUpdate(snapshot));

        tracing::trace!(
            producer = %producer_id,
            watchers = watchers.len(),
            delivered = delivered,
            "Snapshot forwarded"
        );
        delivered
    }

    /// Point a consumer at a producer and replay its cached snapshot
    ///
    /// Returns whether a cached snapshot was delivered.
    pub async fn on_watch_request(
        &self,
        connection: &ConnectionHandle,
        producer_id: ProducerId,
    ) -> Result<bool, RegistryError> {
        let _order = self.fanout.lock().await;

        self.consumers
            .set_watch(connection.id(), Some(producer_id.clone()))
            .await?;

        let Some(snapshot) = self.producers.latest_snapshot(&producer_id).await else {
            tracing::debug!(
                connection_id = connection.id(),
                producer = %producer_id,
                "Watching producer with no cached snapshot"
            );
            return Ok(false);
        };

        match connection.send(OutboundEvent::ScreenUpdate(snapshot)) {
            Ok(()) => {
                tracing::debug!(
                    connection_id = connection.id(),
                    producer = %producer_id,
                    "Replayed cached snapshot"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = connection.id(),
                    producer = %producer_id,
                    error = %e,
                    "Snapshot replay dropped"
                );
                Ok(false)
            }
        }
    }

    /// Clear a consumer's watch target
    pub async fn on_unwatch_request(&self, connection_id: ConnectionId) -> Result<(), RegistryError> {
        self.consumers.set_watch(connection_id, None).await
    }

    /// Ask one producer, or all of them, for a fresh capture
    pub async fn on_screenshot_request(&self, producer_id: Option<&ProducerId>) -> usize {
        self.route_to_producers(producer_id, OutboundEvent::RequestScreenshot {})
            .await
    }

    /// Send a command to one producer, or all of them
    pub async fn on_command(&self, producer_id: Option<&ProducerId>, command: Value) -> usize {
        self.route_to_producers(producer_id, OutboundEvent::ExecuteCommand { command })
            .await
    }

    /// Push overlay text to one producer, or all of them
    ///
    /// Only an absent `text` is rejected; `""` and `0` are valid values.
    pub async fn on_text_update(
        &self,
        producer_id: Option<&ProducerId>,
        text: Option<Value>,
    ) -> Result<usize, ValidationError> {
        let text = text.ok_or(ValidationError::MissingField("text"))?;
        Ok(self
            .route_to_producers(producer_id, OutboundEvent::UpdateOverlay { text })
            .await)
    }

    /// Show or hide the overlay on one producer, or all of them
    pub async fn on_toggle_overlay(&self, producer_id: Option<&ProducerId>, visible: bool) -> usize {
        self.route_to_producers(producer_id, OutboundEvent::ToggleOverlay { visible })
            .await
    }

    /// Targeted-else-broadcast delivery
    async fn route_to_producers(&self, producer_id: Option<&ProducerId>, event: OutboundEvent) -> usize {
        let targets = match producer_id {
            Some(id) => match self.producers.connection(id).await {
                Some(connection) => vec![connection],
                None => {
                    tracing::debug!(
                        producer = %id,
                        event = event.name(),
                        "Target producer not registered, dropping"
                    );
                    return 0;
                }
            },
            None => self.producers.connections().await,
        };

        let delivered = deliver_all(&targets, &event);
        tracing::debug!(
            event = event.name(),
            producer = ?producer_id,
            delivered = delivered,
            "Routed to producers"
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::connection::OutboundReceiver;

    struct Fixture {
        router: Router,
        producers: Arc<ProducerRegistry>,
        consumers: Arc<ConsumerRegistry>,
    }

    fn fixture() -> Fixture {
        let producers = Arc::new(ProducerRegistry::new());
        let consumers = Arc::new(ConsumerRegistry::new());
        Fixture {
            router: Router::new(Arc::clone(&producers), Arc::clone(&consumers)),
            producers,
            consumers,
        }
    }

    async fn add_producer(f: &Fixture, id: &str, conn: ConnectionId) -> OutboundReceiver {
        let (handle, rx) = ConnectionHandle::channel(conn, 16);
        f.producers.register(id.into(), handle, None).await;
        rx
    }

    async fn add_consumer(f: &Fixture, conn: ConnectionId) -> (ConnectionHandle, OutboundReceiver) {
        let (handle, rx) = ConnectionHandle::channel(conn, 16);
        f.consumers.register(handle.clone()).await;
        (handle, rx)
    }

    fn snapshot(id: &str, ts: i64) -> Snapshot {
        Snapshot::new(id.into(), Bytes::from(format!("img-{}", ts)), ts)
    }

    #[tokio::test]
    async fn test_snapshot_reaches_only_watchers() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        let _p2 = add_producer(&f, "pc-2", 2).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;
        let (c2, mut c2_rx) = add_consumer(&f, 11).await;
        let (_c3, mut c3_rx) = add_consumer(&f, 12).await;

        f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap();
        f.router.on_watch_request(&c2, "pc-2".into()).await.unwrap();

        let delivered = f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", 100)).await;

        assert_eq!(delivered, 1);
        assert_eq!(
            c1_rx.try_recv().unwrap(),
            OutboundEvent::ScreenUpdate(snapshot("pc-1", 100))
        );
        assert!(c2_rx.try_recv().is_err());
        assert!(c3_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_from_unknown_producer_dropped() {
        let f = fixture();
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;
        f.router.on_watch_request(&c1, "ghost".into()).await.unwrap();

        let delivered = f.router.on_snapshot_update(&"ghost".into(), 99, snapshot("ghost", 1)).await;

        assert_eq!(delivered, 0);
        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_replays_cached_snapshot_once() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", 100)).await;

        let (c1, mut c1_rx) = add_consumer(&f, 10).await;
        assert!(f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap());

        assert_eq!(
            c1_rx.try_recv().unwrap(),
            OutboundEvent::ScreenUpdate(snapshot("pc-1", 100))
        );
        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_without_snapshot_delivers_nothing() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;

        assert!(!f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap());
        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_watch_requires_registered_consumer() {
        let f = fixture();
        let (stranger, _rx) = ConnectionHandle::channel(99, 4);

        let result = f.router.on_watch_request(&stranger, "pc-1".into()).await;
        assert_eq!(result, Err(RegistryError::UnknownConsumer(99)));
    }

    #[tokio::test]
    async fn test_unwatch_stops_updates() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;

        f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap();
        f.router.on_unwatch_request(c1.id()).await.unwrap();
        f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", 100)).await;

        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_snapshot_order_preserved_per_watcher() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;
        f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap();

        for ts in [100, 200, 300] {
            f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", ts)).await;
            match c1_rx.try_recv().unwrap() {
                OutboundEvent::ScreenUpdate(s) => assert_eq!(s.timestamp, ts),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_backlogged_watcher_gets_newest_snapshot() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;

        let (slow, mut slow_rx) = ConnectionHandle::channel(10, 2);
        f.consumers.register(slow.clone()).await;
        f.router.on_watch_request(&slow, "pc-1".into()).await.unwrap();

        for ts in [1, 2, 3] {
            f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", ts)).await;
        }

        // Only the newest capture is pending; the stale ones were replaced
        assert_eq!(
            slow_rx.try_recv().unwrap(),
            OutboundEvent::ScreenUpdate(snapshot("pc-1", 3))
        );
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(f.producers.latest_snapshot(&"pc-1".into()).await.unwrap().timestamp, 3);
    }

    #[tokio::test]
    async fn test_closed_watcher_does_not_block_others() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;

        let (gone, gone_rx) = add_consumer(&f, 10).await;
        let (fast, mut fast_rx) = add_consumer(&f, 11).await;
        f.router.on_watch_request(&gone, "pc-1".into()).await.unwrap();
        f.router.on_watch_request(&fast, "pc-1".into()).await.unwrap();
        drop(gone_rx);

        let delivered = f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", 1)).await;

        assert_eq!(delivered, 1);
        assert_eq!(
            fast_rx.try_recv().unwrap(),
            OutboundEvent::ScreenUpdate(snapshot("pc-1", 1))
        );
    }

    #[tokio::test]
    async fn test_snapshot_from_replaced_connection_not_forwarded() {
        let f = fixture();
        let _old = add_producer(&f, "pc-1", 1).await;
        let _new = add_producer(&f, "pc-1", 2).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;
        f.router.on_watch_request(&c1, "pc-1".into()).await.unwrap();

        let delivered = f.router.on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", 5)).await;

        assert_eq!(delivered, 0);
        assert!(c1_rx.try_recv().is_err());
        assert!(f.producers.latest_snapshot(&"pc-1".into()).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_watch_racing_pushes_ends_on_newest_snapshot() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;

        for round in 0..50u64 {
            let base = round as i64 * 1000;
            let consumer_id = 100 + round;
            let (consumer, mut rx) = add_consumer(&f, consumer_id).await;

            let pusher = {
                let router = f.router.clone();
                tokio::spawn(async move {
                    for ts in base + 1..=base + 100 {
                        router
                            .on_snapshot_update(&"pc-1".into(), 1, snapshot("pc-1", ts))
                            .await;
                        tokio::task::yield_now().await;
                    }
                })
            };
            let watcher = {
                let router = f.router.clone();
                tokio::spawn(async move { router.on_watch_request(&consumer, "pc-1".into()).await })
            };

            pusher.await.unwrap();
            watcher.await.unwrap().unwrap();

            let mut last = None;
            while let Ok(event) = rx.try_recv() {
                if let OutboundEvent::ScreenUpdate(s) = event {
                    last = Some(s.timestamp);
                }
            }
            assert_eq!(last, Some(base + 100), "round {}", round);

            f.router.on_unwatch_request(consumer_id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_watch_waits_for_in_flight_fanout() {
        let f = fixture();
        let _p1 = add_producer(&f, "pc-1", 1).await;
        let (c1, mut c1_rx) = add_consumer(&f, 10).await;

        let order = f.router.fanout.lock().await;
        let watcher = {
            let router = f.router.clone();
            tokio::spawn(async move { router.on_watch_request(&c1, "pc-1".into()).await })
        };
        tokio::task::yield_now().await;
        assert!(!watcher.is_finished());
        assert_eq!(f.consumers.watched(10).await, Some(None));

        drop(order);
        assert_eq!(watcher.await.unwrap(), Ok(false));
        assert_eq!(f.consumers.watched(10).await, Some(Some("pc-1".into())));
        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_targeted_command_reaches_only_target() {
        let f = fixture();
        let mut p1 = add_producer(&f, "pc-1", 1).await;
        let mut p2 = add_producer(&f, "pc-2", 2).await;

        let delivered = f.router.on_command(Some(&"pc-2".into()), json!("notepad")).await;

        assert_eq!(delivered, 1);
        assert!(p1.try_recv().is_err());
        assert_eq!(
            p2.try_recv().unwrap(),
            OutboundEvent::ExecuteCommand {
                command: json!("notepad")
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_target_reaches_no_one() {
        let f = fixture();
        let mut p1 = add_producer(&f, "pc-1", 1).await;

        assert_eq!(f.router.on_screenshot_request(Some(&"ghost".into())).await, 0);
        assert_eq!(f.router.on_toggle_overlay(Some(&"ghost".into()), true).await, 0);
        assert_eq!(
            f.router
                .on_text_update(Some(&"ghost".into()), Some(json!("hi")))
                .await,
            Ok(0)
        );
        assert!(p1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_untargeted_request_broadcasts_to_all_producers() {
        let f = fixture();
        let mut p1 = add_producer(&f, "pc-1", 1).await;
        let mut p2 = add_producer(&f, "pc-2", 2).await;
        let (_c1, mut c1_rx) = add_consumer(&f, 10).await;

        assert_eq!(f.router.on_screenshot_request(None).await, 2);
        assert_eq!(p1.try_recv().unwrap(), OutboundEvent::RequestScreenshot {});
        assert_eq!(p2.try_recv().unwrap(), OutboundEvent::RequestScreenshot {});
        assert!(c1_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_with_no_producers() {
        let f = fixture();
        assert_eq!(f.router.on_command(None, json!("ls")).await, 0);
    }

    #[tokio::test]
    async fn test_text_update_validation() {
        let f = fixture();
        let mut p1 = add_producer(&f, "pc-1", 1).await;

        assert_eq!(
            f.router.on_text_update(None, None).await,
            Err(ValidationError::MissingField("text"))
        );
        assert!(p1.try_recv().is_err());

        assert_eq!(f.router.on_text_update(None, Some(json!(""))).await, Ok(1));
        assert_eq!(f.router.on_text_update(None, Some(json!(0))).await, Ok(1));
        assert_eq!(
            p1.try_recv().unwrap(),
            OutboundEvent::UpdateOverlay { text: json!("") }
        );
        assert_eq!(
            p1.try_recv().unwrap(),
            OutboundEvent::UpdateOverlay { text: json!(0) }
        );
    }

    #[tokio::test]
    async fn test_toggle_overlay_broadcast() {
        let f = fixture();
        let mut p1 = add_producer(&f, "pc-1", 1).await;
        let mut p2 = add_producer(&f, "pc-2", 2).await;

        assert_eq!(f.router.on_toggle_overlay(None, false).await, 2);
        assert_eq!(
            p1.try_recv().unwrap(),
            OutboundEvent::ToggleOverlay { visible: false }
        );
        assert_eq!(
            p2.try_recv().unwrap(),
            OutboundEvent::ToggleOverlay { visible: false }
        );
    }
}
