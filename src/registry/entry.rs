//! Registry entry types
//!
//! This module defines the per-producer and per-consumer state stored in the
//! registries, plus the read-only projection used for producer listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionHandle, ConnectionId};

use super::snapshot::{ProducerId, Snapshot};

/// Display name used when a producer does not report a hostname
pub const DEFAULT_DISPLAY_NAME: &str = "Unknown";

/// Entry for a single producer in the registry
#[derive(Debug, Clone)]
pub struct ProducerEntry {
    /// Key, fixed for the lifetime of the entry
    pub producer_id: ProducerId,

    /// Connection the producer is currently reachable on
    pub connection: ConnectionHandle,

    /// Human-readable label (hostname)
    pub display_name: String,

    /// When the producer registered
    pub connected_at: DateTime<Utc>,

    /// Most recent capture, if any was published since registration
    pub latest_snapshot: Option<Snapshot>,

    /// Insertion order, kept across re-registration under the same id
    pub(super) seq: u64,
}

impl ProducerEntry {
    pub(super) fn new(
        producer_id: ProducerId,
        connection: ConnectionHandle,
        display_name: Option<String>,
        seq: u64,
    ) -> Self {
        Self {
            producer_id,
            connection,
            display_name: display_name.unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            connected_at: Utc::now(),
            latest_snapshot: None,
            seq,
        }
    }

    /// Identity of the connection that owns this entry
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Whether a capture is cached
    pub fn has_snapshot(&self) -> bool {
        self.latest_snapshot.is_some()
    }

    /// Listing projection (never includes the payload)
    pub fn summary(&self) -> ProducerSummary {
        ProducerSummary {
            client_id: self.producer_id.clone(),
            hostname: self.display_name.clone(),
            connected_at: self.connected_at,
            has_screenshot: self.has_snapshot(),
        }
    }
}

/// Producer listing row, as sent in `pc_list_update`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerSummary {
    pub client_id: ProducerId,
    pub hostname: String,
    pub connected_at: DateTime<Utc>,
    pub has_screenshot: bool,
}

/// Entry for a single consumer
#[derive(Debug, Clone)]
pub struct ConsumerEntry {
    /// Connection the consumer is reachable on (its key)
    pub connection: ConnectionHandle,

    /// Producer being watched; may name a producer that has since left
    pub watched_producer_id: Option<ProducerId>,
}

impl ConsumerEntry {
    pub(super) fn new(connection: ConnectionHandle) -> Self {
        Self {
            connection,
            watched_producer_id: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Whether this consumer watches `producer_id`
    pub fn is_watching(&self, producer_id: &ProducerId) -> bool {
        self.watched_producer_id.as_ref() == Some(producer_id)
    }
}
