//! Fixed-interval request gate.
//!
//! Each source key is either *Idle* (never allowed, or its window elapsed) or
//! *Cooling* (last allowed request is less than one window ago). A request in
//! the Idle state is allowed and moves the key to Cooling; a request while
//! Cooling is rejected and leaves the state untouched. There is no queue and
//! no burst capacity.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Decision made by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Let the request through
    Allow,
    /// Reject the request; the caller should try again later
    Reject,
}

impl GateDecision {
    /// Check if this decision is Allow.
    pub fn is_allow(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    /// Check if this decision is Reject.
    pub fn is_reject(&self) -> bool {
        matches!(self, GateDecision::Reject)
    }
}

/// Per-key gate state. The key itself lives in the map holding the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitEntry {
    /// When a request for this key was last allowed
    pub last_allowed_at: Option<DateTime<Utc>>,
    /// Window that applied to that request
    pub last_window: Duration,
}

impl RateLimitEntry {
    /// An entry that has never allowed a request.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Whether a request at `now` falls inside the window of the last allowed one.
    ///
    /// A clock that moved backwards counts as still cooling.
    pub fn is_cooling(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_allowed_at {
            None => false,
            Some(last) => {
                let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
                elapsed_ms < window_millis(window)
            }
        }
    }

    /// Register a request at `now` and decide whether it passes.
    ///
    /// # Example
    /// ```
    /// use hype_rank::domain::gate::{GateDecision, RateLimitEntry};
    /// use chrono::{Duration as ChronoDuration, Utc};
    /// use std::time::Duration;
    ///
    /// let window = Duration::from_secs(10);
    /// let t0 = Utc::now();
    /// let mut entry = RateLimitEntry::idle();
    ///
    /// assert_eq!(entry.register_request(t0, window), GateDecision::Allow);
    /// assert_eq!(entry.register_request(t0 + ChronoDuration::seconds(1), window), GateDecision::Reject);
    /// assert_eq!(entry.register_request(t0 + ChronoDuration::seconds(11), window), GateDecision::Allow);
    /// ```
    pub fn register_request(&mut self, now: DateTime<Utc>, window: Duration) -> GateDecision {
        if self.is_cooling(now, window) {
            GateDecision::Reject
        } else {
            self.last_allowed_at = Some(now);
            self.last_window = window;
            GateDecision::Allow
        }
    }

    /// Whether the window opened by the last allowed request is still running.
    ///
    /// Dropping an entry in this state would let the key through early.
    pub fn holds_window(&self, now: DateTime<Utc>) -> bool {
        self.is_cooling(now, self.last_window)
    }

    /// Whether this entry may be dropped: never allowed, or last allowed more
    /// than `retention` before `now` and no longer inside its own window.
    pub fn is_stale(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        match self.last_allowed_at {
            None => true,
            Some(last) => {
                !self.holds_window(now)
                    && now.signed_duration_since(last).num_milliseconds() > window_millis(retention)
            }
        }
    }
}

fn window_millis(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}
