// ABOUTME: MockSocket, MockRoom, and MockStrategy implementations.
// ABOUTME: Scriptable state transitions and call counters for asserting connector behavior.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

use crate::config::RoomConfig;
use crate::traits::{
    ActionMessage, ActionPayload, ActionReceiver, ActionSender, PeerEvent, PeerEventStream, PeerId,
    RelaySocket, RelaySocketMap, Room, SocketState, Strategy,
};

/// Relay socket with externally scriptable state
pub struct MockSocket {
    tx: Mutex<Option<watch::Sender<SocketState>>>,
    rx: watch::Receiver<SocketState>,
}

impl MockSocket {
    pub fn new(initial: SocketState) -> Arc<Self> {
        let (tx, rx) = watch::channel(initial);
        Arc::new(Self {
            tx: Mutex::new(Some(tx)),
            rx,
        })
    }

    /// Drive the socket to a new state
    pub fn set_state(&self, state: SocketState) {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(state);
        }
    }

    /// Drop the state sender, as a vanished transport would
    pub fn hang_up(&self) {
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

impl RelaySocket for MockSocket {
    fn state(&self) -> SocketState {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<SocketState> {
        self.rx.clone()
    }
}

struct ActionEndpoints {
    /// Test side injects inbound traffic here
    inbound_tx: mpsc::Sender<(PeerId, ActionPayload)>,
    /// Test side drains what the consumer sent
    outbound_rx: mpsc::Receiver<ActionMessage>,
}

/// Room handle that records leaves and loops actions through test-visible channels
pub struct MockRoom {
    label: String,
    leaves: AtomicUsize,
    peers: Mutex<Vec<PeerId>>,
    peer_listeners: Mutex<Vec<mpsc::Sender<PeerEvent>>>,
    actions: tokio::sync::Mutex<HashMap<String, ActionEndpoints>>,
}

impl MockRoom {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            leaves: AtomicUsize::new(0),
            peers: Mutex::new(Vec::new()),
            peer_listeners: Mutex::new(Vec::new()),
            actions: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of times `leave` was called
    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }

    pub fn is_left(&self) -> bool {
        self.leave_count() > 0
    }

    /// Seed the peer list without emitting events
    pub fn add_peer(&self, id: impl Into<PeerId>) {
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.into());
    }

    /// Emit a peer event to every subscribed stream
    pub async fn emit(&self, event: PeerEvent) {
        let listeners: Vec<_> = self
            .peer_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in listeners {
            let _ = listener.send(event.clone()).await;
        }
    }

    /// Push an inbound message onto a previously created action channel.
    /// Returns false if the action was never created or its receiver is gone.
    pub async fn inject_action(
        &self,
        name: &str,
        peer: impl Into<PeerId>,
        payload: ActionPayload,
    ) -> bool {
        let actions = self.actions.lock().await;
        match actions.get(name) {
            Some(endpoints) => endpoints.inbound_tx.send((peer.into(), payload)).await.is_ok(),
            None => false,
        }
    }

    /// Pop the next message the consumer sent on an action channel, if any
    pub async fn sent_action(&self, name: &str) -> Option<ActionMessage> {
        let mut actions = self.actions.lock().await;
        actions.get_mut(name)?.outbound_rx.try_recv().ok()
    }
}

#[async_trait]
impl Room for MockRoom {
    async fn make_action(&self, name: &str) -> Result<(ActionSender, ActionReceiver)> {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        self.actions.lock().await.insert(
            name.to_string(),
            ActionEndpoints {
                inbound_tx,
                outbound_rx,
            },
        );
        Ok((outbound_tx, inbound_rx))
    }

    async fn peer_events(&self) -> Result<PeerEventStream> {
        let (tx, rx) = mpsc::channel(64);
        self.peer_listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn peers(&self) -> Vec<PeerId> {
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn leave(&self) -> Result<()> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Strategy with scriptable join behavior and socket exposure
pub struct MockStrategy {
    join_error: Option<String>,
    sockets: Option<Vec<(String, Arc<MockSocket>)>>,
    joins: AtomicUsize,
    socket_requests: AtomicUsize,
    rooms: Mutex<Vec<Arc<MockRoom>>>,
}

impl MockStrategy {
    fn build(
        join_error: Option<String>,
        sockets: Option<Vec<(String, Arc<MockSocket>)>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            join_error,
            sockets,
            joins: AtomicUsize::new(0),
            socket_requests: AtomicUsize::new(0),
            rooms: Mutex::new(Vec::new()),
        })
    }

    /// Joins succeed and no sockets are exposed (assumed always healthy)
    pub fn healthy() -> Arc<Self> {
        Self::build(None, None)
    }

    /// Joins succeed; health is probed through the given sockets
    pub fn with_sockets(sockets: Vec<(&str, Arc<MockSocket>)>) -> Arc<Self> {
        Self::build(
            None,
            Some(
                sockets
                    .into_iter()
                    .map(|(name, s)| (name.to_string(), s))
                    .collect(),
            ),
        )
    }

    /// Every `join_room` call fails with the given reason
    pub fn failing_join(reason: &str) -> Arc<Self> {
        Self::build(Some(reason.to_string()), None)
    }

    /// Number of `join_room` calls
    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }

    /// Number of `relay_sockets` calls
    pub fn socket_request_count(&self) -> usize {
        self.socket_requests.load(Ordering::SeqCst)
    }

    /// Rooms handed out so far, in join order
    pub fn rooms(&self) -> Vec<Arc<MockRoom>> {
        self.rooms.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The most recently joined room
    pub fn last_room(&self) -> Option<Arc<MockRoom>> {
        self.rooms().last().cloned()
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    async fn join_room(&self, config: &RoomConfig, room_id: &str) -> Result<Arc<dyn Room>> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.join_error {
            bail!("{}", reason);
        }
        let room = MockRoom::new(format!("{}/{}", config.app_id, room_id));
        self.rooms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(room.clone());
        let handle: Arc<dyn Room> = room;
        Ok(handle)
    }

    fn relay_sockets(&self) -> Option<RelaySocketMap> {
        self.socket_requests.fetch_add(1, Ordering::SeqCst);
        self.sockets.as_ref().map(|sockets| {
            sockets
                .iter()
                .map(|(name, s)| (name.clone(), s.clone() as Arc<dyn RelaySocket>))
                .collect()
        })
    }
}
