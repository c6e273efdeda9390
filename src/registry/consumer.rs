//! Consumer registry implementation
//!
//! Tracks which producer, if any, each consumer connection is watching.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::connection::{ConnectionHandle, ConnectionId};

use super::entry::ConsumerEntry;
use super::error::RegistryError;
use super::snapshot::ProducerId;

/// Registry of live consumers
pub struct ConsumerRegistry {
    consumers: RwLock<HashMap<ConnectionId, ConsumerEntry>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a consumer with no watch target
    ///
    /// Registering the same connection again resets its watch target.
    pub async fn register(&self, connection: ConnectionHandle) {
        let connection_id = connection.id();
        let mut consumers = self.consumers.write().await;
        consumers.insert(connection_id, ConsumerEntry::new(connection));

        tracing::info!(
            connection_id = connection_id,
            consumers = consumers.len(),
            "Consumer registered"
        );
    }

    /// Remove a consumer; returns whether it was registered
    pub async fn unregister(&self, connection_id: ConnectionId) -> bool {
        let removed = self.consumers.write().await.remove(&connection_id).is_some();

        if removed {
            tracing::info!(connection_id = connection_id, "Consumer unregistered");
        }
        removed
    }

    /// Set or clear the producer a consumer watches
    ///
    /// The target does not have to be registered.
    pub async fn set_watch(
        &self,
        connection_id: ConnectionId,
        producer_id: Option<ProducerId>,
    ) -> Result<(), RegistryError> {
        let mut consumers = self.consumers.write().await;
        let entry = consumers
            .get_mut(&connection_id)
            .ok_or(RegistryError::UnknownConsumer(connection_id))?;

        tracing::debug!(
            connection_id = connection_id,
            previous = ?entry.watched_producer_id,
            watching = ?producer_id,
            "Watch target changed"
        );
        entry.watched_producer_id = producer_id;
        Ok(())
    }

    /// Producer a consumer currently watches
    ///
    /// `None` if the consumer is unknown; `Some(None)` if it watches nothing.
    pub async fn watched(&self, connection_id: ConnectionId) -> Option<Option<ProducerId>> {
        self.consumers
            .read()
            .await
            .get(&connection_id)
            .map(|e| e.watched_producer_id.clone())
    }

    /// Connections of every consumer watching `producer_id`
    pub async fn list_watching(&self, producer_id: &ProducerId) -> Vec<ConnectionHandle> {
        self.consumers
            .read()
            .await
            .values()
            .filter(|e| e.is_watching(producer_id))
            .map(|e| e.connection.clone())
            .collect()
    }

    /// All consumer entries
    pub async fn list_all(&self) -> Vec<ConsumerEntry> {
        self.consumers.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.consumers.read().await.contains_key(&connection_id)
    }

    /// Number of registered consumers
    pub async fn len(&self) -> usize {
        self.consumers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
