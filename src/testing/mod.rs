// ABOUTME: Deterministic mocks for strategies, rooms, and relay sockets.
// ABOUTME: Lets tests script join failures, socket timing, and disconnects without real transports.

mod mock;

pub use mock::{MockRoom, MockSocket, MockStrategy};
