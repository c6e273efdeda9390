//! Per-connection task
//!
//! Splits the stream into a read loop (frames -> `Relay::dispatch`) and a
//! writer task (outbound queue -> frames). However the read loop ends (EOF,
//! idle timeout, I/O or protocol error) the relay's disconnect handling runs
//! exactly once afterwards.
//!
//! Liveness is inbound-only: after half the idle timeout without a frame the
//! relay sends `ping`, and a peer that stays silent for the other half is
//! closed. Any inbound frame, `pong` included, resets the clock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::connection::{ConnectionHandle, ConnectionId, OutboundReceiver};
use crate::error::Result;
use crate::protocol::{FrameCodec, OutboundEvent};
use crate::relay::Relay;
use crate::session::SessionState;

use super::config::ServerConfig;

/// How long the writer may keep flushing after the reader has stopped
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Serve one peer until it disconnects
pub async fn serve_connection<S>(
    id: ConnectionId,
    stream: S,
    peer_addr: SocketAddr,
    config: &ServerConfig,
    relay: Arc<Relay>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let codec = FrameCodec::new(config.max_payload_size);
    let (handle, rx) = ConnectionHandle::channel(id, config.outbound_queue_capacity);

    let mut session = relay.on_connect(&handle, peer_addr);
    tracing::debug!(connection_id = id, peer = %peer_addr, "Session started");

    let mut writer_task = tokio::spawn(write_loop(writer, rx, codec));

    let result = read_loop(
        reader,
        &mut session,
        &handle,
        &relay,
        codec,
        config.idle_timeout,
        config.read_buffer_size,
    )
    .await;

    relay.on_disconnect(&session).await;

    // Registries no longer hold this connection; dropping the last handle
    // lets the writer flush what is queued and finish.
    drop(handle);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer_task)
        .await
        .is_err()
    {
        writer_task.abort();
    }

    result
}

/// Decode frames and dispatch them until EOF, idle timeout or error
pub(crate) async fn read_loop<R>(
    mut reader: R,
    session: &mut SessionState,
    handle: &ConnectionHandle,
    relay: &Relay,
    codec: FrameCodec,
    idle_timeout: Duration,
    buffer_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(buffer_size);
    let mut ping_pending = false;

    loop {
        while let Some(body) = codec.decode(&mut buf)? {
            session.record_frame(body.len());

            match FrameCodec::decode_event(&body) {
                Ok(event) => relay.dispatch(session, handle, event).await,
                Err(e) => {
                    tracing::warn!(
                        connection_id = session.id,
                        error = %e,
                        "Skipping undecodable frame"
                    );
                }
            }
        }

        let read = if idle_timeout.is_zero() {
            reader.read_buf(&mut buf).await?
        } else {
            match tokio::time::timeout(idle_timeout / 2, reader.read_buf(&mut buf)).await {
                Ok(read) => {
                    ping_pending = false;
                    read?
                }
                Err(_) if !ping_pending => {
                    ping_pending = true;
                    if let Err(e) = handle.send(OutboundEvent::Ping {}) {
                        tracing::debug!(connection_id = session.id, error = %e, "Ping dropped");
                    }
                    continue;
                }
                Err(_) => {
                    tracing::info!(
                        connection_id = session.id,
                        idle_secs = idle_timeout.as_secs(),
                        "Connection idle, closing"
                    );
                    return Ok(());
                }
            }
        };

        if read == 0 {
            if !buf.is_empty() {
                tracing::debug!(
                    connection_id = session.id,
                    pending = buf.len(),
                    "Peer closed mid-frame"
                );
            }
            return Ok(());
        }
    }
}

/// Encode queued events onto the stream until every handle is dropped
pub(crate) async fn write_loop<W>(
    mut writer: W,
    mut rx: OutboundReceiver,
    codec: FrameCodec,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();

    while let Some(event) = rx.recv().await {
        buf.clear();
        codec.encode(&event, &mut buf)?;

        // Coalesce whatever else is already queued into one write
        while let Ok(next) = rx.try_recv() {
            codec.encode(&next, &mut buf)?;
        }

        writer.write_all(&buf).await?;
        writer.flush().await?;
    }

    Ok(())
}
