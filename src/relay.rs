//! Relay service
//!
//! The process-level object that owns both registries and wires the router
//! and lifecycle manager to them. Connection tasks hand it decoded events;
//! it checks them against the session's declared role and invokes the
//! matching core operation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;

use crate::connection::ConnectionHandle;
use crate::lifecycle::{Lifecycle, RoleDeclaration};
use crate::protocol::{InboundEvent, OutboundEvent};
use crate::registry::{ConsumerRegistry, ProducerRegistry, Snapshot};
use crate::router::Router;
use crate::session::SessionState;
use crate::stats::{ConnectionCounters, RelayStats};

/// Producer/consumer relay
pub struct Relay {
    producers: Arc<ProducerRegistry>,
    consumers: Arc<ConsumerRegistry>,
    router: Router,
    lifecycle: Lifecycle,
    counters: ConnectionCounters,
}

impl Relay {
    /// Create a relay with empty registries
    pub fn new() -> Self {
        Self::with_registries(
            Arc::new(ProducerRegistry::new()),
            Arc::new(ConsumerRegistry::new()),
        )
    }

    /// Create a relay over existing registries
    pub fn with_registries(producers: Arc<ProducerRegistry>, consumers: Arc<ConsumerRegistry>) -> Self {
        Self {
            router: Router::new(Arc::clone(&producers), Arc::clone(&consumers)),
            lifecycle: Lifecycle::new(Arc::clone(&producers), Arc::clone(&consumers)),
            producers,
            consumers,
            counters: ConnectionCounters::new(),
        }
    }

    pub fn producers(&self) -> &Arc<ProducerRegistry> {
        &self.producers
    }

    pub fn consumers(&self) -> &Arc<ConsumerRegistry> {
        &self.consumers
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn counters(&self) -> &ConnectionCounters {
        &self.counters
    }

    /// Start tracking a new transport connection
    pub fn on_connect(&self, connection: &ConnectionHandle, peer_addr: SocketAddr) -> SessionState {
        self.counters.on_open();

        let mut session = SessionState::new(connection.id(), peer_addr);
        session.role = self.lifecycle.on_connect(connection);
        session
    }

    /// Apply one inbound event from `session`'s peer
    pub async fn dispatch(
        &self,
        session: &mut SessionState,
        connection: &ConnectionHandle,
        event: InboundEvent,
    ) {
        tracing::trace!(
            connection_id = session.id,
            event = event.name(),
            "Inbound event"
        );

        match event {
            InboundEvent::ClientType {
                role,
                client_id,
                hostname,
            } => {
                if !session.is_undeclared() {
                    tracing::warn!(
                        connection_id = session.id,
                        role = ?session.role,
                        "Role already declared, ignoring client_type"
                    );
                    return;
                }

                let declaration = RoleDeclaration {
                    role,
                    producer_id: client_id,
                    display_name: hostname,
                };
                session.role = self.lifecycle.on_role_declared(connection, declaration).await;
            }

            InboundEvent::WatchPc { client_id } => {
                if let Err(e) = self.router.on_watch_request(connection, client_id).await {
                    tracing::warn!(connection_id = session.id, error = %e, "watch_pc ignored");
                }
            }

            InboundEvent::UnwatchPc {} => {
                if let Err(e) = self.router.on_unwatch_request(session.id).await {
                    tracing::warn!(connection_id = session.id, error = %e, "unwatch_pc ignored");
                }
            }

            InboundEvent::ScreenUpdate { image, timestamp } => {
                let Some(producer_id) = session.producer_id().cloned() else {
                    tracing::warn!(
                        connection_id = session.id,
                        "screen_update from a connection that is not a producer"
                    );
                    return;
                };

                // Dropped by the registry if a newer connection took over this id
                let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
                let snapshot = Snapshot::new(producer_id.clone(), Bytes::from(image), timestamp);
                self.router
                    .on_snapshot_update(&producer_id, session.id, snapshot)
                    .await;
            }

            InboundEvent::RequestScreenshot { client_id } => {
                self.router.on_screenshot_request(client_id.as_ref()).await;
            }

            InboundEvent::RemoteCommand { client_id, command } => {
                self.router.on_command(client_id.as_ref(), command).await;
            }

            InboundEvent::Ping {} => {
                if let Err(e) = connection.send(OutboundEvent::Pong {}) {
                    tracing::debug!(connection_id = session.id, error = %e, "Pong dropped");
                }
            }

            // Liveness is recorded by the read loop
            InboundEvent::Pong {} => {}
        }
    }

    /// Tear down a connection's registrations
    ///
    /// Called exactly once per connection by its task; the underlying
    /// unregister operations tolerate repeats.
    pub async fn on_disconnect(&self, session: &SessionState) {
        self.lifecycle.on_disconnect(session.id).await;
        self.counters.on_close();

        tracing::debug!(
            connection_id = session.id,
            role = ?session.role,
            frames = session.frames_received,
            bytes = session.bytes_received,
            duration_ms = session.duration().as_millis() as u64,
            "Session ended"
        );
    }

    /// Current relay statistics
    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            producers: self.producers.len().await,
            consumers: self.consumers.len().await,
            active_connections: self.counters.active(),
            total_connections: self.counters.total(),
            uptime_secs: self.counters.uptime().as_secs(),
        }
    }

    /// Spawn background heartbeat task
    ///
    /// Logs relay statistics every `interval`. Returns a handle that can be
    /// used to abort the task.
    pub fn spawn_heartbeat_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let stats = relay.stats().await;
                tracing::info!(
                    producers = stats.producers,
                    consumers = stats.consumers,
                    connections = stats.active_connections,
                    uptime_secs = stats.uptime_secs,
                    "Heartbeat"
                );
            }
        })
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
