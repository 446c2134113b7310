use std::time::Duration;

/// What the refresh loop does once a cycle has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextCycle {
    /// Sleep for the remainder of the interval.
    Wait(Duration),
    /// The cycle took longer than the interval; start the next one now.
    Overrun { by: Duration },
}

/// Cycles start one `interval` apart, measured start to start. A cycle that
/// overruns is followed immediately by the next, never by a second
/// concurrent one.
pub fn next_cycle(interval: Duration, elapsed: Duration) -> NextCycle {
    match interval.checked_sub(elapsed) {
        Some(remaining) if !remaining.is_zero() => NextCycle::Wait(remaining),
        _ => NextCycle::Overrun {
            by: elapsed.saturating_sub(interval),
        },
    }
}

impl NextCycle {
    pub fn delay(self) -> Duration {
        match self {
            NextCycle::Wait(d) => d,
            NextCycle::Overrun { .. } => Duration::ZERO,
        }
    }
}
