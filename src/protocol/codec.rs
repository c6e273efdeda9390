//! Length-prefixed JSON framing
//!
//! The 4-byte big-endian length is checked against the configured maximum
//! before any body bytes are buffered, so oversized payloads are rejected
//! outright rather than truncated.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::error::ProtocolError;

use super::event::InboundEvent;

/// Size of the length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Frame encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec accepting bodies up to `max_frame_size` bytes
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Maximum accepted body size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Split one complete frame body off the front of `buf`
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = (&buf[..FRAME_HEADER_SIZE]).get_u32() as usize;
        if len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total = FRAME_HEADER_SIZE + len;
        if buf.len() < total {
            buf.reserve(total - buf.len());
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        Ok(Some(buf.split_to(len).freeze()))
    }

    /// Parse a frame body into an inbound event
    pub fn decode_event(body: &[u8]) -> Result<InboundEvent, ProtocolError> {
        serde_json::from_slice(body).map_err(ProtocolError::Decode)
    }

    /// Serialize `event` and append it as one frame
    pub fn encode<T: Serialize + ?Sized>(
        &self,
        event: &T,
        dst: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        let body = serde_json::to_vec(event).map_err(ProtocolError::Encode)?;

        dst.reserve(FRAME_HEADER_SIZE + body.len());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}
