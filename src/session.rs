// ABOUTME: RoomSession facade over the connector and health watcher.
// ABOUTME: Holds the current room, fans out reconnects in order, tears down idempotently.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::RoomConfig;
use crate::connector::{self, Connection};
use crate::error::AllStrategiesFailed;
use crate::registry::StrategyRegistry;
use crate::traits::{Room, Strategy};
use crate::watcher::HealthWatcher;

/// Lifecycle of a session. `Left` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// A reconnect scan is in flight, or the last one exhausted the registry
    /// and the session is stalled on its dead connection
    Reconnecting,
    /// A room is live on the current strategy
    Connected,
    /// Torn down by `leave`
    Left,
}

/// Callback invoked after each successful reconnection with the new room and
/// the name of the strategy it landed on
pub type ReconnectHandler = Arc<dyn Fn(Arc<dyn Room>, &str) + Send + Sync>;

struct SessionState {
    status: SessionStatus,
    room: Arc<dyn Room>,
    /// True once `room.leave()` has run, so a stalled reconnect followed by
    /// teardown closes the handle only once
    room_closed: bool,
    strategy_name: String,
    watcher: Option<HealthWatcher>,
    handlers: Vec<ReconnectHandler>,
}

struct SessionInner {
    registry: StrategyRegistry,
    config: RoomConfig,
    room_id: String,
    active: AtomicBool,
    /// Bumped on every adopted connection; disconnect signals from older
    /// generations are ignored.
    epoch: AtomicU64,
    disconnect_tx: mpsc::Sender<u64>,
    state: Mutex<SessionState>,
}

/// A room session that survives transport failures.
///
/// On any relay close/error the session scans the registry from index 0 again
/// and swaps in the first healthy strategy, so the session prefers the
/// globally-best strategy rather than staying on a second choice indefinitely.
///
/// A cached `room()` reference goes stale after a swap; consumers that need
/// the live room must resubscribe through [`RoomSession::on_reconnect`].
pub struct RoomSession {
    inner: Arc<SessionInner>,
    supervisor: JoinHandle<()>,
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.inner.room_id)
            .finish_non_exhaustive()
    }
}

impl RoomSession {
    /// Join `room_id` using the first healthy strategy in the registry.
    ///
    /// Fails only when every strategy is exhausted on the initial scan.
    pub async fn connect(
        registry: StrategyRegistry,
        config: RoomConfig,
        room_id: impl Into<String>,
    ) -> Result<Self, AllStrategiesFailed> {
        let room_id = room_id.into();
        let connection = connector::connect(&registry, &config, &room_id, 0).await?;

        let (disconnect_tx, mut disconnect_rx) = mpsc::channel(8);
        let inner = Arc::new(SessionInner {
            registry,
            config,
            room_id,
            active: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
            disconnect_tx,
            state: Mutex::new(SessionState {
                status: SessionStatus::Connected,
                room: connection.room,
                room_closed: false,
                strategy_name: connection.strategy_name,
                watcher: None,
                handlers: Vec::new(),
            }),
        });

        {
            let mut state = inner.state.lock().await;
            state.watcher = inner.watch(&connection.strategy, 0);
        }

        let weak = Arc::downgrade(&inner);
        let supervisor = tokio::spawn(async move {
            // One signal handled at a time; overlapping reconnects cannot occur.
            while let Some(epoch) = disconnect_rx.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.handle_disconnect(epoch).await;
            }
        });

        Ok(Self { inner, supervisor })
    }

    /// Current room handle snapshot
    pub async fn room(&self) -> Arc<dyn Room> {
        self.inner.state.lock().await.room.clone()
    }

    /// Name of the currently adopted strategy
    pub async fn strategy(&self) -> String {
        self.inner.state.lock().await.strategy_name.clone()
    }

    /// Current lifecycle status
    pub async fn status(&self) -> SessionStatus {
        self.inner.state.lock().await.status
    }

    /// False once the session has been torn down
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Register a reconnect handler. Handlers run once per successful
    /// reconnection, in registration order, after the new connection is fully
    /// watched. Rebinding application actions onto the new room is the
    /// handler's job.
    pub async fn on_reconnect<F>(&self, handler: F)
    where
        F: Fn(Arc<dyn Room>, &str) + Send + Sync + 'static,
    {
        self.inner.state.lock().await.handlers.push(Arc::new(handler));
    }

    /// Tear the session down: stop watching, drop handlers, leave the room.
    /// Safe to call more than once; only the first call does work.
    pub async fn leave(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut state = self.inner.state.lock().await;
        state.status = SessionStatus::Left;
        state.handlers.clear();
        if let Some(watcher) = state.watcher.take() {
            watcher.detach();
        }
        if !state.room_closed {
            state.room_closed = true;
            if let Err(err) = state.room.leave().await {
                tracing::debug!(room = %self.inner.room_id, error = %err, "leave reported error");
            }
        }
        drop(state);

        self.supervisor.abort();
        tracing::info!(room = %self.inner.room_id, "session left");
    }
}

impl SessionInner {
    /// Attach a health watcher for the strategy's relay sockets, if it has any.
    fn watch(&self, strategy: &Arc<dyn Strategy>, epoch: u64) -> Option<HealthWatcher> {
        let sockets = strategy.relay_sockets()?;
        if sockets.is_empty() {
            return None;
        }
        Some(HealthWatcher::attach(
            sockets,
            epoch,
            self.disconnect_tx.clone(),
        ))
    }

    async fn handle_disconnect(self: &Arc<Self>, epoch: u64) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if epoch != self.epoch.load(Ordering::SeqCst) {
            // Signal from a watcher generation that has already been replaced.
            return;
        }

        let mut state = self.state.lock().await;
        if !self.active.load(Ordering::SeqCst) || state.status == SessionStatus::Left {
            return;
        }

        state.status = SessionStatus::Reconnecting;
        tracing::warn!(
            room = %self.room_id,
            strategy = %state.strategy_name,
            "relay connection lost, reconnecting"
        );

        if let Some(watcher) = state.watcher.take() {
            watcher.detach();
        }
        // The dead room is discarded; close it before adopting a replacement.
        if !state.room_closed {
            state.room_closed = true;
            if let Err(err) = state.room.leave().await {
                tracing::debug!(room = %self.room_id, error = %err, "leave on dead room failed");
            }
        }

        match connector::connect(&self.registry, &self.config, &self.room_id, 0).await {
            Ok(Connection {
                room,
                strategy,
                strategy_name,
            }) => {
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                state.room = room.clone();
                state.room_closed = false;
                state.strategy_name = strategy_name.clone();
                state.watcher = self.watch(&strategy, epoch);
                state.status = SessionStatus::Connected;
                let handlers = state.handlers.clone();
                drop(state);

                tracing::info!(
                    room = %self.room_id,
                    strategy = %strategy_name,
                    "reconnected"
                );
                for handler in handlers {
                    handler(room.clone(), &strategy_name);
                }
            }
            Err(err) => {
                // Stalled on the last-known-bad connection; one scan per
                // disconnect signal, no retry loop.
                tracing::error!(room = %self.room_id, error = %err, "reconnect failed, session stalled");
            }
        }
    }
}
