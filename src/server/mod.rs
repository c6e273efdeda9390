//! Relay server
//!
//! TCP accept loop plus one task per connection that decodes frames into
//! events for the relay and drains the connection's outbound queue.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
