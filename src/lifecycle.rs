//! Lifecycle manager
//!
//! Handles role declaration and disconnection, keeping both registries
//! consistent and telling consumers whenever the producer set changes.

use std::sync::Arc;

use crate::connection::{deliver_all, ConnectionHandle, ConnectionId};
use crate::protocol::{ClientRole, OutboundEvent};
use crate::registry::{ConsumerRegistry, ProducerId, ProducerRegistry};
use crate::session::SessionRole;

/// Fields carried by a `client_type` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDeclaration {
    pub role: ClientRole,
    /// Producer id; defaults to the connection id when absent
    pub producer_id: Option<ProducerId>,
    /// Producer hostname
    pub display_name: Option<String>,
}

impl RoleDeclaration {
    pub fn producer(producer_id: Option<ProducerId>, display_name: Option<String>) -> Self {
        Self {
            role: ClientRole::Producer,
            producer_id,
            display_name,
        }
    }

    pub fn consumer() -> Self {
        Self {
            role: ClientRole::Consumer,
            producer_id: None,
            display_name: None,
        }
    }
}

/// Join/leave handling for producers and consumers
#[derive(Clone)]
pub struct Lifecycle {
    producers: Arc<ProducerRegistry>,
    consumers: Arc<ConsumerRegistry>,
}

impl Lifecycle {
    pub fn new(producers: Arc<ProducerRegistry>, consumers: Arc<ConsumerRegistry>) -> Self {
        Self {
            producers,
            consumers,
        }
    }

    /// A transport connection opened; nothing is registered until it
    /// declares a role
    pub fn on_connect(&self, connection: &ConnectionHandle) -> SessionRole {
        tracing::debug!(connection_id = connection.id(), "Awaiting role declaration");
        SessionRole::Undeclared
    }

    /// Register the connection under its declared role
    ///
    /// Producers trigger a producer-list broadcast to every consumer;
    /// consumers receive the current list point-to-point.
    pub async fn on_role_declared(
        &self,
        connection: &ConnectionHandle,
        declaration: RoleDeclaration,
    ) -> SessionRole {
        match declaration.role {
            ClientRole::Producer => {
                let producer_id = declaration
                    .producer_id
                    .unwrap_or_else(|| ProducerId::from_connection(connection.id()));

                self.producers
                    .register(producer_id.clone(), connection.clone(), declaration.display_name)
                    .await;
                self.broadcast_producer_list().await;

                SessionRole::Producer(producer_id)
            }
            ClientRole::Consumer => {
                self.consumers.register(connection.clone()).await;

                let pcs = self.producers.list_all().await;
                if let Err(e) = connection.send(OutboundEvent::PcListUpdate { pcs }) {
                    tracing::debug!(
                        connection_id = connection.id(),
                        error = %e,
                        "Initial producer list dropped"
                    );
                }

                SessionRole::Consumer
            }
        }
    }

    /// Clean up after a connection closed
    ///
    /// Safe to call more than once. Returns the producer id that was
    /// removed, if the connection was a producer still owning its entry.
    pub async fn on_disconnect(&self, connection_id: ConnectionId) -> Option<ProducerId> {
        let removed = self.producers.unregister_by_connection(connection_id).await;
        if removed.is_some() {
            self.broadcast_producer_list().await;
        }

        self.consumers.unregister(connection_id).await;
        removed
    }

    /// Send the current producer list to every consumer
    pub async fn broadcast_producer_list(&self) -> usize {
        let pcs = self.producers.list_all().await;
        let targets: Vec<ConnectionHandle> = self
            .consumers
            .list_all()
            .await
            .into_iter()
            .map(|entry| entry.connection)
            .collect();
        let producer_count = pcs.len();

        let delivered = deliver_all(&targets, &OutboundEvent::PcListUpdate { pcs });
        tracing::debug!(
            producers = producer_count,
            consumers = targets.len(),
            delivered = delivered,
            "Producer list broadcast"
        );
        delivered
    }
}
