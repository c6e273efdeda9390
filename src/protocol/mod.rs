//! Relay wire protocol
//!
//! Every message is a length-prefixed JSON frame carrying one named event:
//!
//! ```text
//! +----------------+--------------------------------------------+
//! | length: u32 BE | {"event": "<name>", "data": { ... }}       |
//! +----------------+--------------------------------------------+
//! ```
//!
//! Events are decoded into closed enums at the transport boundary, so the
//! registries and the router only ever see well-typed input.
//!
//! Peers must answer a relay `ping` with `pong` (or send any other frame)
//! before the idle timeout, or the relay closes the connection.

pub mod codec;
pub mod event;

pub use codec::{FrameCodec, FRAME_HEADER_SIZE};
pub use event::{ClientRole, InboundEvent, OutboundEvent};
