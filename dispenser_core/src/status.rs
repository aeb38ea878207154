//! Controller state and per-call outcomes.

use crate::error::RejectReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseState {
    Idle,
    Dispensing,
}

/// Result of one `on_tick` evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No session active.
    Idle,
    /// Session active, target not yet reached.
    Dispensing { delivered_g: f32 },
    /// Target reached on this tick; gate commanded closed.
    Complete { delivered_g: f32 },
    /// Session exceeded `max_dispense_ms`; gate commanded closed.
    TimedOut { delivered_g: f32 },
}

impl TickOutcome {
    /// True when this tick ended a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::TimedOut { .. })
    }
}

/// Result of `start_dispensing`. Informational; a rejection changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Rejected(RejectReason),
}
