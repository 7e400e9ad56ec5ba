//! Reconnection backoff policy and phase tracking.
//!
//! Stream and socket transports share this state machine for recovering
//! from transient connection loss:
//!
//! ```text
//! Idle ──► BackoffPending{n} ──► Connecting{n} ──► Connected
//!              ▲                      │
//!              └──────── failure ─────┘
//! ```
//!
//! Delay computation is pure so it can be tested without timers; the
//! transports sleep through `tokio::time`, which tests drive with the
//! paused clock.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// First reconnect delay.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Ceiling for the exponential reconnect delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Exponential backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Ceiling for the doubled delay.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: INITIAL_BACKOFF,
            max: MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    /// Returns the delay before the given attempt (1-based).
    ///
    /// Doubles per attempt, capped at [`BackoffPolicy::max`].
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let initial_ms = self.initial.as_millis() as u64;
        let delay_ms = initial_ms.saturating_mul(1_u64 << exponent);
        Duration::from_millis(delay_ms).min(self.max)
    }
}

// ============================================================================
// ReconnectPhase
// ============================================================================

/// Phase of one transport's reconnect lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// No connection and no retry scheduled.
    #[default]
    Idle,

    /// Waiting out the backoff delay before a retry.
    BackoffPending {
        /// 1-based attempt about to run.
        attempt: u32,
    },

    /// A retry connect is in flight.
    Connecting {
        /// 1-based attempt in flight.
        attempt: u32,
    },

    /// Connection established.
    Connected,
}

// ============================================================================
// ReconnectState
// ============================================================================

/// Tracks the reconnect lifecycle for one transport instance.
#[derive(Debug)]
pub struct ReconnectState {
    /// Delay policy.
    policy: BackoffPolicy,
    /// Current phase.
    phase: ReconnectPhase,
    /// Attempt counter, reset on success.
    attempt: u32,
}

impl ReconnectState {
    /// Creates an idle state with the given policy.
    #[inline]
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            phase: ReconnectPhase::Idle,
            attempt: 0,
        }
    }

    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    /// Returns the current attempt number.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Advances to the next backoff wait, returning the delay to sleep.
    pub fn begin_backoff(&mut self) -> Duration {
        self.attempt += 1;
        self.phase = ReconnectPhase::BackoffPending {
            attempt: self.attempt,
        };
        self.policy.delay_for(self.attempt)
    }

    /// Marks the retry connect as in flight.
    pub fn begin_connecting(&mut self) {
        self.phase = ReconnectPhase::Connecting {
            attempt: self.attempt,
        };
    }

    /// Marks the connection established, resetting the attempt counter.
    pub fn connected(&mut self) {
        self.attempt = 0;
        self.phase = ReconnectPhase::Connected;
    }

    /// Returns to idle (explicit disconnect or reconnection disabled).
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.phase = ReconnectPhase::Idle;
    }
}

// ============================================================================
// Tests
// ============================================================================
