//! Control surface
//!
//! Typed request bodies and operations for the HTTP-style control endpoints
//! (`/update`, `/toggle-overlay`, `/latest-screenshot`, `/connected-pcs`,
//! `/ping`). Hosting them is left to the embedding application; these
//! methods are what its handlers call.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::registry::{ProducerId, ProducerSummary, Snapshot};
use crate::relay::Relay;
use crate::stats::RelayStats;

/// Body of an overlay text update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextUpdateRequest {
    /// New overlay text; any JSON value, `null` counts as absent
    #[serde(default)]
    pub text: Option<Value>,

    /// Target producer; all producers when absent
    #[serde(rename = "clientId", default)]
    pub client_id: Option<ProducerId>,
}

/// Body of an overlay visibility toggle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OverlayToggleRequest {
    pub visible: bool,

    /// Target producer; all producers when absent
    #[serde(rename = "clientId", default)]
    pub client_id: Option<ProducerId>,
}

impl Relay {
    /// Route overlay text; returns the number of producers reached
    pub async fn update_text(&self, request: TextUpdateRequest) -> Result<usize, ValidationError> {
        let result = self
            .router()
            .on_text_update(request.client_id.as_ref(), request.text)
            .await;

        if let Err(ref e) = result {
            tracing::warn!(error = %e, "Rejected overlay text update");
        }
        result
    }

    /// Route an overlay toggle; returns the number of producers reached
    pub async fn toggle_overlay(&self, request: OverlayToggleRequest) -> usize {
        self.router()
            .on_toggle_overlay(request.client_id.as_ref(), request.visible)
            .await
    }

    /// Cached snapshot of a producer
    ///
    /// Without an id, the newest snapshot across all producers.
    pub async fn latest_snapshot(&self, producer_id: Option<&ProducerId>) -> Option<Snapshot> {
        match producer_id {
            Some(id) => self.producers().latest_snapshot(id).await,
            None => self.producers().newest_snapshot().await,
        }
    }

    /// Listing of connected producers
    pub async fn connected_producers(&self) -> Vec<ProducerSummary> {
        self.producers().list_all().await
    }

    /// Connection counts
    pub async fn ping(&self) -> RelayStats {
        self.stats().await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;

    use super::*;
    use crate::connection::ConnectionHandle;
    use crate::lifecycle::RoleDeclaration;
    use crate::protocol::OutboundEvent;

    #[test]
    fn test_text_request_distinguishes_absent_from_empty() {
        let missing: TextUpdateRequest = serde_json::from_value(json!({})).unwrap();
        let null: TextUpdateRequest = serde_json::from_value(json!({"text": null})).unwrap();
        let empty: TextUpdateRequest = serde_json::from_value(json!({"text": ""})).unwrap();
        let zero: TextUpdateRequest = serde_json::from_value(json!({"text": 0})).unwrap();

        assert_eq!(missing.text, None);
        assert_eq!(null.text, None);
        assert_eq!(empty.text, Some(json!("")));
        assert_eq!(zero.text, Some(json!(0)));
    }

    #[test]
    fn test_toggle_request_requires_visible() {
        let result: Result<OverlayToggleRequest, _> =
            serde_json::from_value(json!({"clientId": "pc-1"}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_text_targeted() {
        let relay = Relay::new();
        let (p1, mut p1_rx) = ConnectionHandle::channel(1, 4);
        let (p2, mut p2_rx) = ConnectionHandle::channel(2, 4);
        for (handle, id) in [(&p1, "pc-1"), (&p2, "pc-2")] {
            relay
                .lifecycle()
                .on_role_declared(handle, RoleDeclaration::producer(Some(id.into()), None))
                .await;
        }

        let request: TextUpdateRequest =
            serde_json::from_value(json!({"text": "hello", "clientId": "pc-2"})).unwrap();
        assert_eq!(relay.update_text(request).await, Ok(1));

        assert!(p1_rx.try_recv().is_err());
        assert_eq!(
            p2_rx.try_recv().unwrap(),
            OutboundEvent::UpdateOverlay {
                text: json!("hello")
            }
        );
    }

    #[tokio::test]
    async fn test_update_text_missing_rejected() {
        let relay = Relay::new();
        let request: TextUpdateRequest = serde_json::from_value(json!({})).unwrap();

        assert_eq!(
            relay.update_text(request).await,
            Err(ValidationError::MissingField("text"))
        );
    }

    #[tokio::test]
    async fn test_toggle_overlay_broadcast() {
        let relay = Relay::new();
        let (p1, mut p1_rx) = ConnectionHandle::channel(1, 4);
        relay
            .lifecycle()
            .on_role_declared(&p1, RoleDeclaration::producer(None, None))
            .await;

        let request: OverlayToggleRequest =
            serde_json::from_value(json!({"visible": true})).unwrap();
        assert_eq!(relay.toggle_overlay(request).await, 1);
        assert_eq!(
            p1_rx.try_recv().unwrap(),
            OutboundEvent::ToggleOverlay { visible: true }
        );
    }

    #[tokio::test]
    async fn test_latest_snapshot_targeted_and_fallback() {
        let relay = Relay::new();
        for (conn, id, ts) in [(1, "pc-1", 300), (2, "pc-2", 100)] {
            let (handle, _rx) = ConnectionHandle::channel(conn, 4);
            relay
                .lifecycle()
                .on_role_declared(&handle, RoleDeclaration::producer(Some(id.into()), None))
                .await;
            let snapshot = Snapshot::new(id.into(), Bytes::from_static(b"img"), ts);
            relay
                .router()
                .on_snapshot_update(&id.into(), conn, snapshot)
                .await;
        }

        let targeted = relay.latest_snapshot(Some(&"pc-2".into())).await.unwrap();
        assert_eq!(targeted.timestamp, 100);

        let newest = relay.latest_snapshot(None).await.unwrap();
        assert_eq!(newest.producer_id.as_str(), "pc-1");

        assert!(relay.latest_snapshot(Some(&"ghost".into())).await.is_none());
    }

    #[tokio::test]
    async fn test_connected_producers_and_ping() {
        let relay = Relay::new();
        let (p1, _p1_rx) = ConnectionHandle::channel(1, 4);
        let (c1, _c1_rx) = ConnectionHandle::channel(2, 4);
        relay
            .lifecycle()
            .on_role_declared(&p1, RoleDeclaration::producer(Some("pc-1".into()), Some("HOST".into())))
            .await;
        relay
            .lifecycle()
            .on_role_declared(&c1, RoleDeclaration::consumer())
            .await;

        let listed = relay.connected_producers().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].hostname, "HOST");
        assert!(!listed[0].has_screenshot);

        let stats = relay.ping().await;
        assert_eq!(stats.producers, 1);
        assert_eq!(stats.consumers, 1);
    }
}
