//! Producer identity and the cached capture

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::connection::ConnectionId;

/// Stable identity of a logical producer
///
/// Supplied by the producer when it declares its role; falls back to the
/// decimal connection id when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProducerId(String);

impl ProducerId {
    /// Create a producer id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id derived from a connection that did not name itself
    pub fn from_connection(id: ConnectionId) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProducerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProducerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Most recent capture published by a producer
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Encoded image (opaque to the relay)
    #[serde(
        rename = "image",
        serialize_with = "serialize_payload",
        deserialize_with = "deserialize_payload"
    )]
    pub payload: Bytes,

    /// Capture time in epoch milliseconds
    pub timestamp: i64,

    /// Producer that published it
    #[serde(rename = "clientId")]
    pub producer_id: ProducerId,
}

impl Snapshot {
    /// Create a snapshot
    pub fn new(producer_id: ProducerId, payload: impl Into<Bytes>, timestamp: i64) -> Self {
        Self {
            payload: payload.into(),
            timestamp,
            producer_id,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

// Producers send images as text (data URLs), so the payload travels as a
// JSON string.
fn serialize_payload<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(payload) {
        Ok(s) => serializer.serialize_str(s),
        Err(_) => serializer.serialize_str(&String::from_utf8_lossy(payload)),
    }
}

fn deserialize_payload<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    String::deserialize(deserializer).map(Bytes::from)
}
