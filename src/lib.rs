// ABOUTME: Resilient peer-room sessions with ordered transport-strategy fallback.
// ABOUTME: Scans a registry of strategies, probes relay health, and reconnects on socket loss.

//! # roomlink
//!
//! A room session that survives transport failures. Strategies (e.g. "nostr",
//! "torrent", "mqtt", "ipfs") are registered in priority order; the connector
//! adopts the first one whose relay sockets open within the probe window, a
//! watcher converts socket close/error into a reconnect, and the session fans
//! the replacement room out to registered handlers.
//!
//! ```no_run
//! use roomlink::{RoomConfig, RoomSession, StrategyRegistry};
//! # use roomlink::testing::MockStrategy;
//!
//! # async fn example() -> Result<(), roomlink::AllStrategiesFailed> {
//! let registry = StrategyRegistry::new()
//!     .register_ready("nostr", MockStrategy::healthy())
//!     .register_ready("mqtt", MockStrategy::healthy());
//!
//! let session = RoomSession::connect(registry, RoomConfig::new("my-app"), "lobby").await?;
//! session
//!     .on_reconnect(|room, strategy| {
//!         // Rebind application actions onto the new room here.
//!         let _ = (room, strategy);
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod registry;
pub mod session;
pub mod traits;

pub mod testing;

mod watcher;

pub use config::{RoomConfig, DEFAULT_PROBE_WINDOW};
pub use connector::Connection;
pub use error::{AllStrategiesFailed, StrategyFailure};
pub use registry::{StrategyDescriptor, StrategyRegistry};
pub use session::{ReconnectHandler, RoomSession, SessionStatus};
pub use traits::{
    ActionMessage, ActionPayload, ActionReceiver, ActionSender, PeerEvent, PeerEventStream, PeerId,
    RelaySocket, RelaySocketMap, Room, SocketState, Strategy,
};
