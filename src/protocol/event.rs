//! Typed relay events
//!
//! Inbound events arrive from producers (`client_type`, `screen_update`) and
//! consumers (`client_type`, `watch_pc`, `unwatch_pc`, `request_screenshot`,
//! `remote_command`); any peer may send `ping` or answer the relay's `ping`
//! with `pong`. Outbound events are what the relay emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::{ProducerId, ProducerSummary, Snapshot};

/// Role a connection declares in `client_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientRole {
    /// Remote machine publishing screen captures
    #[serde(rename = "windows")]
    Producer,
    /// Viewer subscribing to a producer
    #[serde(rename = "web")]
    Consumer,
}

/// Event received from a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Role declaration
    ClientType {
        #[serde(rename = "type")]
        role: ClientRole,
        #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
        client_id: Option<ProducerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
    },

    /// Consumer subscribes to a producer
    WatchPc {
        #[serde(rename = "clientId")]
        client_id: ProducerId,
    },

    /// Consumer drops its subscription
    UnwatchPc {},

    /// Producer pushes a new capture
    ScreenUpdate {
        image: String,
        /// Capture time in epoch milliseconds; the relay stamps it if absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Ask one producer (or all) for a fresh capture
    RequestScreenshot {
        #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
        client_id: Option<ProducerId>,
    },

    /// Run a command on one producer (or all)
    RemoteCommand {
        #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
        client_id: Option<ProducerId>,
        command: Value,
    },

    /// Transport keepalive
    Ping {},

    /// Reply to a relay `ping`
    Pong {},
}

impl InboundEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ClientType { .. } => "client_type",
            InboundEvent::WatchPc { .. } => "watch_pc",
            InboundEvent::UnwatchPc {} => "unwatch_pc",
            InboundEvent::ScreenUpdate { .. } => "screen_update",
            InboundEvent::RequestScreenshot { .. } => "request_screenshot",
            InboundEvent::RemoteCommand { .. } => "remote_command",
            InboundEvent::Ping {} => "ping",
            InboundEvent::Pong {} => "pong",
        }
    }
}

/// Event sent to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Current producer list (to consumers)
    PcListUpdate { pcs: Vec<ProducerSummary> },

    /// Latest capture of a watched producer (to consumers)
    ScreenUpdate(Snapshot),

    /// Capture request (to producers)
    RequestScreenshot {},

    /// Command to run (to producers)
    ExecuteCommand { command: Value },

    /// New overlay text (to producers)
    UpdateOverlay { text: Value },

    /// Overlay visibility (to producers)
    ToggleOverlay { visible: bool },

    /// Keepalive reply
    Pong {},

    /// Liveness check sent to a silent peer
    Ping {},
}

impl OutboundEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::PcListUpdate { .. } => "pc_list_update",
            OutboundEvent::ScreenUpdate(_) => "screen_update",
            OutboundEvent::RequestScreenshot {} => "request_screenshot",
            OutboundEvent::ExecuteCommand { .. } => "execute_command",
            OutboundEvent::UpdateOverlay { .. } => "update_overlay",
            OutboundEvent::ToggleOverlay { .. } => "toggle_overlay",
            OutboundEvent::Pong {} => "pong",
            OutboundEvent::Ping {} => "ping",
        }
    }
}
