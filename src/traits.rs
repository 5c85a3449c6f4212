// ABOUTME: Core traits for pluggable room transports.
// ABOUTME: Strategy joins rooms, Room carries peers and actions, RelaySocket reports liveness.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::Stream;

use crate::config::RoomConfig;

/// Peer identifier as reported by a transport strategy
pub type PeerId = String;

/// A peer joined or left the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Joined(PeerId),
    Left(PeerId),
}

/// Boxed stream of peer join/leave events
pub type PeerEventStream = Pin<Box<dyn Stream<Item = PeerEvent> + Send>>;

/// Payload carried on an action channel
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    /// Raw bytes
    Binary(Vec<u8>),
    /// Structured JSON
    Json(serde_json::Value),
}

/// An outbound action message. `target: None` broadcasts to all peers.
#[derive(Debug, Clone)]
pub struct ActionMessage {
    pub target: Option<PeerId>,
    pub payload: ActionPayload,
}

/// Sending half of an action channel
pub type ActionSender = mpsc::Sender<ActionMessage>;

/// Receiving half of an action channel; items are (sender peer, payload)
pub type ActionReceiver = mpsc::Receiver<(PeerId, ActionPayload)>;

/// Readiness state of a relay socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Connection in progress
    Connecting,
    /// Connected and usable
    Open,
    /// Closed by either side
    Closed,
    /// Failed with a transport error
    Errored,
}

impl SocketState {
    /// Closed and Errored are terminal; a socket never leaves either state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SocketState::Closed | SocketState::Errored)
    }
}

/// A signaling-server connection whose open/closed state stands in for the
/// health of the whole strategy.
pub trait RelaySocket: Send + Sync {
    /// Current readiness state
    fn state(&self) -> SocketState;

    /// Subscribe to state transitions
    fn subscribe(&self) -> watch::Receiver<SocketState>;
}

/// Map of relay sockets keyed by relay URL or name
pub type RelaySocketMap = HashMap<String, Arc<dyn RelaySocket>>;

/// A live room session owned by whoever the connector hands it to.
///
/// Once a room is discarded (a rejected candidate, or the previous room after a
/// reconnect), `leave` must be called before a replacement is adopted.
#[async_trait]
pub trait Room: Send + Sync {
    /// Open a named bidirectional action channel over the room.
    ///
    /// By convention action names stay at or under 12 bytes for wire
    /// efficiency; strategies are not required to enforce this.
    async fn make_action(&self, name: &str) -> Result<(ActionSender, ActionReceiver)>;

    /// Stream of peer join/leave events
    async fn peer_events(&self) -> Result<PeerEventStream>;

    /// Peers currently known in the room
    async fn peers(&self) -> Vec<PeerId>;

    /// Leave the room and release transport resources
    async fn leave(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Room")
    }
}

/// A pluggable transport/discovery mechanism (e.g. "nostr", "torrent", "mqtt",
/// "ipfs") that can join a room by identifier.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Join a room, returning a live handle. Errors advance the connector to
    /// the next candidate.
    async fn join_room(&self, config: &RoomConfig, room_id: &str) -> Result<Arc<dyn Room>>;

    /// Relay sockets backing this strategy, for health probing and
    /// disconnect-watching. `None` means the transport has no observable
    /// signaling sockets and is assumed healthy.
    fn relay_sockets(&self) -> Option<RelaySocketMap> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_state_terminal() {
        assert!(!SocketState::Connecting.is_terminal());
        assert!(!SocketState::Open.is_terminal());
        assert!(SocketState::Closed.is_terminal());
        assert!(SocketState::Errored.is_terminal());
    }

    #[test]
    fn test_peer_event_equality() {
        assert_eq!(
            PeerEvent::Joined("p1".to_string()),
            PeerEvent::Joined("p1".to_string())
        );
        assert_ne!(
            PeerEvent::Joined("p1".to_string()),
            PeerEvent::Left("p1".to_string())
        );
    }

    #[test]
    fn test_action_payload_variants() {
        let binary = ActionPayload::Binary(vec![1, 2, 3]);
        assert!(matches!(binary, ActionPayload::Binary(b) if b == vec![1, 2, 3]));

        let json = ActionPayload::Json(serde_json::json!({"k": "v"}));
        assert!(matches!(json, ActionPayload::Json(v) if v["k"] == "v"));
    }

    #[test]
    fn test_action_message_broadcast() {
        let msg = ActionMessage {
            target: None,
            payload: ActionPayload::Binary(vec![]),
        };
        assert!(msg.target.is_none());
    }
}
