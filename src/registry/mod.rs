//! Producer and consumer registries
//!
//! Two independent, lock-guarded maps shared by every connection task:
//!
//! ```text
//!          Arc<ProducerRegistry>                 Arc<ConsumerRegistry>
//!   ┌───────────────────────────────┐    ┌──────────────────────────────┐
//!   │ ProducerId -> ProducerEntry { │    │ ConnectionId -> ConsumerEntry│
//!   │   connection,                 │    │   { connection,              │
//!   │   latest_snapshot,            │    │     watched_producer_id }    │
//!   │ }                             │    │                              │
//!   └───────────────┬───────────────┘    └───────────────┬──────────────┘
//!                   │                                    │
//!                   └──────────► Router / Lifecycle ◄────┘
//! ```
//!
//! Locks are held only long enough to mutate or to copy out connection
//! handles. Delivery always happens after the lock is released.
//!
//! # Single Snapshot Design
//!
//! Each producer keeps exactly one `Snapshot`. A new capture replaces the
//! previous one, so stale captures are coalesced away instead of queued.
//! `bytes::Bytes` makes the fan-out clone reference-counted rather than copied.

pub mod consumer;
pub mod entry;
pub mod error;
pub mod producer;
pub mod snapshot;

pub use consumer::ConsumerRegistry;
pub use entry::{ConsumerEntry, ProducerEntry, ProducerSummary, DEFAULT_DISPLAY_NAME};
pub use error::RegistryError;
pub use producer::ProducerRegistry;
pub use snapshot::{ProducerId, Snapshot};
