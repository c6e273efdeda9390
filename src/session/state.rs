//! Session state
//!
//! Tracks what a connection has declared itself to be, from connect to
//! disconnect.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::connection::ConnectionId;
use crate::registry::ProducerId;

/// Role a session has taken on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRole {
    /// Connected, no `client_type` received yet
    Undeclared,
    /// Registered as the producer with this id
    Producer(ProducerId),
    /// Registered as a consumer
    Consumer,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection id
    pub id: ConnectionId,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Declared role
    pub role: SessionRole,

    /// Connection start time
    pub connected_at: Instant,

    /// Frames decoded from the peer
    pub frames_received: u64,

    /// Frame bytes received (excluding length prefixes)
    pub bytes_received: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            role: SessionRole::Undeclared,
            connected_at: Instant::now(),
            frames_received: 0,
            bytes_received: 0,
        }
    }

    /// Whether a role may still be declared
    pub fn is_undeclared(&self) -> bool {
        self.role == SessionRole::Undeclared
    }

    /// Producer id, if this session registered as a producer
    pub fn producer_id(&self) -> Option<&ProducerId> {
        match &self.role {
            SessionRole::Producer(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_consumer(&self) -> bool {
        self.role == SessionRole::Consumer
    }

    /// Account for one received frame
    pub fn record_frame(&mut self, size: usize) {
        self.frames_received += 1;
        self.bytes_received += size as u64;
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
