//! Outbound half of a peer connection
//!
//! The registries never own a transport. They hold a cloneable handle that
//! feeds two outputs drained by the connection's writer task:
//!
//! - a bounded queue for control events; a full queue drops the event
//! - a single latest-snapshot slot; a newer snapshot replaces one the
//!   writer has not taken yet, so a slow watcher skips stale captures
//!   instead of queueing them
//!
//! Sending never waits, which keeps the registry locks free of network I/O.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::watch;

use crate::protocol::OutboundEvent;
use crate::registry::Snapshot;

/// Identity of one transport connection, allocated by the server
pub type ConnectionId = u64;

/// Why an event was not queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Writer side is gone (peer disconnected)
    Closed,
    /// Peer is not draining fast enough
    Full,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "connection closed"),
            DeliveryError::Full => write!(f, "outbound queue full"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Cloneable sender for one peer
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    events: mpsc::Sender<OutboundEvent>,
    snapshot: Arc<watch::Sender<Option<Snapshot>>>,
}

impl ConnectionHandle {
    /// Create a handle together with the receiver its writer task drains
    ///
    /// `capacity` bounds the control-event queue; snapshots never occupy it.
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, OutboundReceiver) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(None);

        let handle = Self {
            id,
            events: events_tx,
            snapshot: Arc::new(snapshot_tx),
        };
        let receiver = OutboundReceiver {
            events: events_rx,
            snapshot: snapshot_rx,
            snapshot_open: true,
        };
        (handle, receiver)
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event without waiting
    ///
    /// `screen_update` goes to the latest-snapshot slot and overwrites any
    /// capture still pending there; everything else is queued.
    pub fn send(&self, event: OutboundEvent) -> Result<(), DeliveryError> {
        match event {
            OutboundEvent::ScreenUpdate(snapshot) => self.send_snapshot(snapshot),
            event => self.events.try_send(event).map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            }),
        }
    }

    /// Replace the pending snapshot for this peer
    pub fn send_snapshot(&self, snapshot: Snapshot) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.snapshot.send_replace(Some(snapshot));
        Ok(())
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Writer-side end of a [`ConnectionHandle`]
#[derive(Debug)]
pub struct OutboundReceiver {
    events: mpsc::Receiver<OutboundEvent>,
    snapshot: watch::Receiver<Option<Snapshot>>,
    snapshot_open: bool,
}

impl OutboundReceiver {
    /// Wait for the next event, pending snapshot first
    ///
    /// Returns `None` once every handle is dropped and nothing is pending.
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        loop {
            tokio::select! {
                biased;

                changed = self.snapshot.changed(), if self.snapshot_open => match changed {
                    Ok(()) => {
                        if let Some(snapshot) = self.snapshot.borrow_and_update().clone() {
                            return Some(OutboundEvent::ScreenUpdate(snapshot));
                        }
                    }
                    Err(_) => self.snapshot_open = false,
                },

                event = self.events.recv() => return event,
            }
        }
    }

    /// Take the next ready event without waiting, pending snapshot first
    pub fn try_recv(&mut self) -> Result<OutboundEvent, TryRecvError> {
        if self.snapshot.has_changed().unwrap_or(false) {
            if let Some(snapshot) = self.snapshot.borrow_and_update().clone() {
                return Ok(OutboundEvent::ScreenUpdate(snapshot));
            }
        }
        self.events.try_recv()
    }
}

/// Send `event` to every target, isolating per-connection failures
///
/// Returns the number of connections the event was queued for.
pub(crate) fn deliver_all(targets: &[ConnectionHandle], event: &OutboundEvent) -> usize {
    let mut delivered = 0;

    for target in targets {
        match target.send(event.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!(
                    connection_id = target.id(),
                    event = event.name(),
                    error = %e,
                    "Dropped outbound event"
                );
            }
        }
    }

    delivered
}
