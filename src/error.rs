// ABOUTME: Typed exhaustion error for the connector's fallback scan.
// ABOUTME: Individual candidate failures are recovered locally; only exhaustion surfaces.

use thiserror::Error;

/// Why a single strategy candidate was rejected during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyFailure {
    /// The strategy module failed to load
    Load(String),
    /// `join_room` returned an error
    Join(String),
    /// No relay socket opened within the probe window
    ProbeTimeout,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyFailure::Load(reason) => write!(f, "load failed: {}", reason),
            StrategyFailure::Join(reason) => write!(f, "join failed: {}", reason),
            StrategyFailure::ProbeTimeout => write!(f, "no relay socket opened in time"),
        }
    }
}

/// Every strategy from the scan's start index to the end of the registry was
/// tried and rejected.
///
/// Fatal for the `connect` invocation that produced it: initial session
/// construction propagates it, a reconnect attempt logs it and stalls.
#[derive(Debug, Clone, Error)]
#[error("all strategies failed for room {room_id} ({} tried)", .failures.len())]
pub struct AllStrategiesFailed {
    /// Room the scan was for
    pub room_id: String,
    /// Per-strategy failure reasons, in attempt order
    pub failures: Vec<(String, StrategyFailure)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_display_counts_failures() {
        let err = AllStrategiesFailed {
            room_id: "lobby".to_string(),
            failures: vec![
                ("nostr".to_string(), StrategyFailure::Load("no module".into())),
                ("mqtt".to_string(), StrategyFailure::ProbeTimeout),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("lobby"));
        assert!(text.contains("2 tried"));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            StrategyFailure::Join("refused".into()).to_string(),
            "join failed: refused"
        );
        assert!(StrategyFailure::ProbeTimeout.to_string().contains("opened"));
    }
}
