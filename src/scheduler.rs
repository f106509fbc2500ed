//! One-shot deadline timer.
//!
//! The node has exactly one outstanding timer at any time.  Arming it
//! replaces whatever deadline was pending, so "reschedule" and "cancel
//! then schedule" are the same operation.  The timer holds no callback:
//! the event loop asks for [`OneShotTimer::deadline`], sleeps until then,
//! handles `TimerFired`, and the owner calls [`OneShotTimer::expire`]
//! to consume the firing.
//!
//! ```text
//!   arm(now, 50)         arm(now', 1000)               expire(t ≥ deadline)
//!   ──●──────────────────────●────────────────────────────────●──▶ t
//!     └── deadline replaced ─┘                                └ None
//! ```
//!
//! All times are milliseconds on the node's monotonic clock.

use log::debug;

/// A single re-armable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OneShotTimer {
    deadline_ms: Option<u64>,
}

impl OneShotTimer {
    pub const fn new() -> Self {
        Self { deadline_ms: None }
    }

    /// Arm to fire `delay_ms` after `now_ms`, replacing any armed deadline.
    pub fn arm(&mut self, now_ms: u64, delay_ms: u32) {
        let deadline = now_ms.saturating_add(delay_ms as u64);
        if let Some(old) = self.deadline_ms.replace(deadline) {
            debug!("timer: deadline {} replaced by {}", old, deadline);
        }
    }

    /// Drop the armed deadline, if any.
    pub fn clear(&mut self) {
        self.deadline_ms = None;
    }

    /// Absolute deadline, `None` when idle.
    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Milliseconds until the deadline (0 when idle or already due).
    pub fn remaining_ms(&self, now_ms: u64) -> u32 {
        self.deadline_ms
            .map_or(0, |d| d.saturating_sub(now_ms).min(u32::MAX as u64) as u32)
    }

    /// Consume the firing if the deadline has passed.
    ///
    /// Returns `false` for stale wake-ups: nothing armed, or the deadline
    /// was pushed back after the wake-up was scheduled.
    pub fn expire(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(d) if now_ms >= d => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}
