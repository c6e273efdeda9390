//! screen-relay: producer/consumer relay for live screen snapshots
//!
//! Producers (remote machines) declare themselves, push periodic captures
//! and accept commands. Consumers (viewers) declare themselves, pick one
//! producer to watch and send commands to it, or to every producer at once.
//!
//! # Architecture
//!
//! ```text
//!   producer ──frames──► [conn task] ──InboundEvent──► Relay ──► Router / Lifecycle
//!                                                        │            │
//!                                          ProducerRegistry    ConsumerRegistry
//!                                                        │            │
//!   consumer ◄──frames── [writer task] ◄──OutboundEvent── ConnectionHandle::send
//! ```
//!
//! Each producer keeps only its latest snapshot. New watchers get that
//! snapshot immediately; later pushes reach only the consumers watching
//! that producer. A consumer that falls behind skips straight to the newest
//! capture instead of working through a backlog. Control events (`request_screenshot`, `execute_command`,
//! `update_overlay`, `toggle_overlay`) go to the named producer, or to all
//! producers when no id is given.
//!
//! # Example
//!
//! ```no_run
//! use screen_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> screen_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod session;
pub mod stats;

pub use connection::{ConnectionHandle, ConnectionId, DeliveryError, OutboundReceiver};
pub use control::{OverlayToggleRequest, TextUpdateRequest};
pub use error::{Error, Result};
pub use lifecycle::{Lifecycle, RoleDeclaration};
pub use protocol::{ClientRole, InboundEvent, OutboundEvent};
pub use registry::{ConsumerRegistry, ProducerId, ProducerRegistry, ProducerSummary, Snapshot};
pub use relay::Relay;
pub use router::Router;
pub use server::{RelayServer, ServerConfig};
pub use stats::RelayStats;
