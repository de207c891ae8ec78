//! Connection liveness tracking.
//!
//! A client that has been silent for [`PING_INTERVAL`] gets a PING;
//! one that stays silent for [`PING_GRACE`] after that is dropped.
//! The decision is a pure function of the two timestamps so tests can
//! drive it with a synthetic clock.

use std::time::{Duration, Instant};

/// Silence that triggers a server PING.
pub const PING_INTERVAL: Duration = Duration::from_secs(60);

/// Time allowed for the PONG before the connection is dropped.
pub const PING_GRACE: Duration = Duration::from_secs(60);

/// What the liveness tick should do for one client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivenessAction {
    /// Send `PING :<token>` and start the grace clock.
    SendPing,
    /// Drop the connection with reason "Ping timeout".
    Timeout,
}

/// Decide the action for a client given its timestamps at `now`.
pub fn decide(
    last_recv_at: Instant,
    ping_sent_at: Option<Instant>,
    now: Instant,
) -> Option<LivenessAction> {
    match ping_sent_at {
        Some(sent) => {
            if now.duration_since(sent) > PING_GRACE {
                Some(LivenessAction::Timeout)
            } else {
                None
            }
        }
        None => {
            if now.duration_since(last_recv_at) > PING_INTERVAL {
                Some(LivenessAction::SendPing)
            } else {
                None
            }
        }
    }
}

/// When this client next needs attention, for the poll-wait budget.
pub fn next_deadline(last_recv_at: Instant, ping_sent_at: Option<Instant>) -> Instant {
    match ping_sent_at {
        Some(sent) => sent + PING_GRACE,
        None => last_recv_at + PING_INTERVAL,
    }
}
