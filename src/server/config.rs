//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default cap on a single inbound frame (5 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Largest accepted inbound frame body, in bytes
    pub max_payload_size: usize,

    /// Control events buffered per connection before new ones are dropped
    ///
    /// Snapshots bypass this queue; each connection holds at most one.
    pub outbound_queue_capacity: usize,

    /// Idle timeout (zero disables)
    ///
    /// A peer silent for half of it is sent `ping`; one still silent at the
    /// full timeout is disconnected.
    pub idle_timeout: Duration,

    /// Interval between heartbeat log lines (zero disables)
    pub heartbeat_interval: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 0, // Unlimited
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            outbound_queue_capacity: 64,
            idle_timeout: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            tcp_nodelay: true,
            read_buffer_size: 64 * 1024, // 64KB
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the inbound frame size limit
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Set the per-connection outbound queue size (at least 1)
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity.max(1);
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set heartbeat interval
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Disable the heartbeat task
    pub fn disable_heartbeat(mut self) -> Self {
        self.heartbeat_interval = Duration::ZERO;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_payload_size, 5 * 1024 * 1024);
        assert_eq!(config.outbound_queue_capacity, 64);
        assert!(config.tcp_nodelay);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 3001);
    }

    #[test]
    fn test_builder_queue_capacity_floor() {
        let config = ServerConfig::default().outbound_queue_capacity(0);

        assert_eq!(config.outbound_queue_capacity, 1);
    }

    #[test]
    fn test_builder_disable_heartbeat() {
        let config = ServerConfig::default().disable_heartbeat();

        assert!(config.heartbeat_interval.is_zero());
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .max_payload_size(1024)
            .idle_timeout(Duration::from_secs(5))
            .heartbeat_interval(Duration::from_secs(10));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.max_payload_size, 1024);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
    }
}
