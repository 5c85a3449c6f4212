// ABOUTME: Ordered fallback scan over the strategy registry.
// ABOUTME: Adopts the first candidate whose relay sockets pass the bounded health probe.

use futures::future::select_all;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RoomConfig;
use crate::error::{AllStrategiesFailed, StrategyFailure};
use crate::registry::StrategyRegistry;
use crate::traits::{RelaySocketMap, Room, SocketState, Strategy};

/// An adopted strategy and its live room handle
pub struct Connection {
    /// Live room handle; the caller becomes the sole owner
    pub room: Arc<dyn Room>,
    /// The strategy that produced the room, kept for socket watching
    pub strategy: Arc<dyn Strategy>,
    /// Name of the adopted strategy
    pub strategy_name: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("strategy_name", &self.strategy_name)
            .finish_non_exhaustive()
    }
}

/// Try strategies from `start_index` in registry order until one yields a room
/// whose relay sockets pass the health probe. Never wraps past the end.
///
/// A rejected candidate's room is left before the next one is tried; load and
/// join errors are recovered locally and only exhaustion surfaces.
pub async fn connect(
    registry: &StrategyRegistry,
    config: &RoomConfig,
    room_id: &str,
    start_index: usize,
) -> Result<Connection, AllStrategiesFailed> {
    let mut failures = Vec::new();

    for index in start_index..registry.len() {
        let descriptor = match registry.descriptor(index) {
            Some(d) => d,
            None => break,
        };
        let name = descriptor.name().to_string();

        let strategy = match descriptor.load().await {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(strategy = %name, error = %err, "strategy failed to load");
                failures.push((name, StrategyFailure::Load(err.to_string())));
                continue;
            }
        };

        let room = match strategy.join_room(config, room_id).await {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(strategy = %name, error = %err, "strategy failed to join room");
                failures.push((name, StrategyFailure::Join(err.to_string())));
                continue;
            }
        };

        if socket_open_within(strategy.relay_sockets(), config.probe_window()).await {
            tracing::info!(strategy = %name, room = %room_id, "room connected");
            return Ok(Connection {
                room,
                strategy,
                strategy_name: name,
            });
        }

        tracing::warn!(strategy = %name, room = %room_id, "no relay socket opened within probe window");
        if let Err(err) = room.leave().await {
            tracing::debug!(strategy = %name, error = %err, "leave on rejected candidate failed");
        }
        failures.push((name, StrategyFailure::ProbeTimeout));
    }

    Err(AllStrategiesFailed {
        room_id: room_id.to_string(),
        failures,
    })
}

/// Wait up to `window` for any relay socket to open.
///
/// No sockets at all is vacuous success. On timeout the result is whether any
/// socket is already open at that instant, so a socket that opened exactly at
/// the deadline still counts.
async fn socket_open_within(sockets: Option<RelaySocketMap>, window: Duration) -> bool {
    let sockets = match sockets {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };

    match tokio::time::timeout(window, any_open(&sockets)).await {
        Ok(opened) => opened,
        Err(_) => sockets
            .values()
            .any(|socket| socket.state() == SocketState::Open),
    }
}

/// Resolve true as soon as any socket reaches Open. Resolves false only if
/// every socket's state sender is dropped without ever opening.
async fn any_open(sockets: &RelaySocketMap) -> bool {
    let mut waiters: Vec<_> = sockets
        .values()
        .map(|socket| {
            let mut rx = socket.subscribe();
            async move { rx.wait_for(|state| *state == SocketState::Open).await.is_ok() }.boxed()
        })
        .collect();

    while !waiters.is_empty() {
        let (opened, _index, rest) = select_all(waiters).await;
        if opened {
            return true;
        }
        waiters = rest;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSocket;
    use std::collections::HashMap;
    use tokio::time::Instant;

    fn socket_map(sockets: Vec<(&str, Arc<MockSocket>)>) -> RelaySocketMap {
        sockets
            .into_iter()
            .map(|(name, s)| (name.to_string(), s as Arc<dyn crate::traits::RelaySocket>))
            .collect()
    }

    #[tokio::test]
    async fn test_no_sockets_is_vacuous_success() {
        assert!(socket_open_within(None, Duration::from_millis(1)).await);
        assert!(socket_open_within(Some(HashMap::new()), Duration::from_millis(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_open_socket_resolves_immediately() {
        let sockets = socket_map(vec![("relay-a", MockSocket::new(SocketState::Open))]);
        let started = Instant::now();
        assert!(socket_open_within(Some(sockets), Duration::from_secs(5)).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_socket_opening_before_deadline_resolves_early() {
        let socket = MockSocket::new(SocketState::Connecting);
        let sockets = socket_map(vec![("relay-a", socket.clone())]);

        let opener = socket.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            opener.set_state(SocketState::Open);
        });

        let started = Instant::now();
        assert!(socket_open_within(Some(sockets), Duration::from_secs(5)).await);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_socket_never_opening_fails_at_deadline() {
        let sockets = socket_map(vec![("relay-a", MockSocket::new(SocketState::Connecting))]);
        let started = Instant::now();
        assert!(!socket_open_within(Some(sockets), Duration::from_secs(5)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_open_socket_among_dead_ones_is_enough() {
        let dead = MockSocket::new(SocketState::Closed);
        let slow = MockSocket::new(SocketState::Connecting);
        let sockets = socket_map(vec![("dead", dead), ("slow", slow.clone())]);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            slow.set_state(SocketState::Open);
        });

        assert!(socket_open_within(Some(sockets), Duration::from_secs(5)).await);
    }
}
