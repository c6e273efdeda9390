//! Producer registry implementation
//!
//! Maps each producer id to its connection and its single cached snapshot.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock};

use crate::connection::{ConnectionHandle, ConnectionId};

use super::entry::{ProducerEntry, ProducerSummary};
use super::snapshot::{ProducerId, Snapshot};

#[derive(Default)]
struct Producers {
    entries: HashMap<ProducerId, ProducerEntry>,
    next_seq: u64,
}

impl Producers {
    /// Entries in insertion order
    fn ordered(&self) -> Vec<&ProducerEntry> {
        let mut entries: Vec<&ProducerEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// Registry of live producers
///
/// Every membership change bumps a generation counter that observers can
/// follow through [`ProducerRegistry::subscribe_changes`].
pub struct ProducerRegistry {
    producers: RwLock<Producers>,
    changes: watch::Sender<u64>,
}

impl ProducerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            producers: RwLock::new(Producers::default()),
            changes,
        }
    }

    /// Register a producer, replacing any entry with the same id
    ///
    /// A replaced entry keeps its position in the listing but loses its
    /// cached snapshot. Returns the connection that was displaced, if any.
    pub async fn register(
        &self,
        producer_id: ProducerId,
        connection: ConnectionHandle,
        display_name: Option<String>,
    ) -> Option<ConnectionHandle> {
        let replaced = {
            let mut producers = self.producers.write().await;

            let existing_seq = producers.entries.get(&producer_id).map(|e| e.seq);
            let seq = match existing_seq {
                Some(seq) => seq,
                None => {
                    let seq = producers.next_seq;
                    producers.next_seq += 1;
                    seq
                }
            };

            let entry = ProducerEntry::new(producer_id.clone(), connection, display_name, seq);
            let connection_id = entry.connection_id();
            let replaced = producers
                .entries
                .insert(producer_id.clone(), entry)
                .map(|old| old.connection);

            match &replaced {
                Some(old) => tracing::info!(
                    producer = %producer_id,
                    connection_id = connection_id,
                    replaced_connection_id = old.id(),
                    "Producer registered (replaced existing)"
                ),
                None => tracing::info!(
                    producer = %producer_id,
                    connection_id = connection_id,
                    producers = producers.entries.len(),
                    "Producer registered"
                ),
            }

            replaced
        };

        self.notify_changed();
        replaced
    }

    /// Remove a producer by id
    ///
    /// Returns whether an entry was removed; unknown ids are a no-op.
    pub async fn unregister(&self, producer_id: &ProducerId) -> bool {
        let removed = self.producers.write().await.entries.remove(producer_id);

        match removed {
            Some(entry) => {
                tracing::info!(
                    producer = %producer_id,
                    connection_id = entry.connection_id(),
                    "Producer unregistered"
                );
                self.notify_changed();
                true
            }
            None => false,
        }
    }

    /// Remove whichever producer is registered on `connection_id`
    ///
    /// An entry that has since been taken over by a newer connection is left
    /// alone. Returns the removed producer's id.
    pub async fn unregister_by_connection(&self, connection_id: ConnectionId) -> Option<ProducerId> {
        let removed = {
            let mut producers = self.producers.write().await;

            let producer_id = producers
                .entries
                .values()
                .find(|e| e.connection_id() == connection_id)
                .map(|e| e.producer_id.clone())?;

            producers.entries.remove(&producer_id);
            producer_id
        };

        tracing::info!(
            producer = %removed,
            connection_id = connection_id,
            "Producer disconnected"
        );
        self.notify_changed();
        Some(removed)
    }

    /// Replace the cached snapshot of a producer
    ///
    /// `from` must be the connection currently registered for the producer.
    /// Updates for unknown producers (typically a late push from one that
    /// just disconnected) and from a connection that has since been replaced
    /// are dropped. Returns whether the update was stored.
    pub async fn update_snapshot(
        &self,
        producer_id: &ProducerId,
        from: ConnectionId,
        snapshot: Snapshot,
    ) -> bool {
        let mut producers = self.producers.write().await;

        match producers.entries.get_mut(producer_id) {
            Some(entry) if entry.connection_id() == from => {
                tracing::trace!(
                    producer = %producer_id,
                    size = snapshot.size(),
                    timestamp = snapshot.timestamp,
                    "Snapshot updated"
                );
                entry.latest_snapshot = Some(snapshot);
                true
            }
            Some(entry) => {
                tracing::debug!(
                    producer = %producer_id,
                    connection_id = from,
                    owner_connection_id = entry.connection_id(),
                    "Snapshot from superseded connection dropped"
                );
                false
            }
            None => {
                tracing::debug!(producer = %producer_id, "Snapshot for unknown producer dropped");
                false
            }
        }
    }

    /// Look up a producer
    pub async fn get(&self, producer_id: &ProducerId) -> Option<ProducerEntry> {
        self.producers.read().await.entries.get(producer_id).cloned()
    }

    /// Connection of a producer, if registered
    pub async fn connection(&self, producer_id: &ProducerId) -> Option<ConnectionHandle> {
        self.producers
            .read()
            .await
            .entries
            .get(producer_id)
            .map(|e| e.connection.clone())
    }

    /// Cached snapshot of a producer, if any
    pub async fn latest_snapshot(&self, producer_id: &ProducerId) -> Option<Snapshot> {
        self.producers
            .read()
            .await
            .entries
            .get(producer_id)
            .and_then(|e| e.latest_snapshot.clone())
    }

    /// Snapshot with the newest timestamp across all producers
    pub async fn newest_snapshot(&self) -> Option<Snapshot> {
        self.producers
            .read()
            .await
            .entries
            .values()
            .filter_map(|e| e.latest_snapshot.as_ref())
            .max_by_key(|s| s.timestamp)
            .cloned()
    }

    /// Listing of all producers in registration order
    pub async fn list_all(&self) -> Vec<ProducerSummary> {
        self.producers
            .read()
            .await
            .ordered()
            .into_iter()
            .map(ProducerEntry::summary)
            .collect()
    }

    /// Connections of all producers in registration order
    pub async fn connections(&self) -> Vec<ConnectionHandle> {
        self.producers
            .read()
            .await
            .ordered()
            .into_iter()
            .map(|e| e.connection.clone())
            .collect()
    }

    /// Number of registered producers
    pub async fn len(&self) -> usize {
        self.producers.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Follow membership changes
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify_changed(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }
}

impl Default for ProducerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
