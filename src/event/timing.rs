//! Debounce and throttle bookkeeping.
//!
//! Timers are keyed by `element id : event type : handler`, which is why
//! id-less elements get a generated id the first time one of their handlers
//! carries a timing modifier, and why the patcher preserves those ids.
//!
//! Debouncing uses a generation counter per key: every burst member bumps
//! the generation and sleeps the quiet period; only the sleeper whose
//! generation is still current when it wakes may dispatch. Throttling is a
//! window stamp per key: the first event opens the window and dispatches,
//! later events inside it are dropped.
//!
//! All waiting goes through `tokio::time`, so tests drive bursts and
//! windows with the paused clock.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::time::Instant;

// ============================================================================
// TimingState
// ============================================================================

/// Shared debounce and throttle state for one dispatcher.
#[derive(Debug, Default)]
pub(crate) struct TimingState {
    debounce: Mutex<FxHashMap<String, u64>>,
    throttle: Mutex<FxHashMap<String, Instant>>,
}

impl TimingState {
    /// Builds the timer key for one element, event type, and handler.
    pub(crate) fn key(element_id: &str, event_type: &str, handler: &str) -> String {
        format!("{element_id}:{event_type}:{handler}")
    }

    /// Waits out the quiet period; true when this caller still owns the
    /// debounce slot afterwards and may dispatch.
    pub(crate) async fn debounce(&self, key: &str, quiet: Duration) -> bool {
        let generation = {
            let mut map = self.debounce.lock();
            let slot = map.entry(key.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };
        tokio::time::sleep(quiet).await;
        self.debounce.lock().get(key).copied() == Some(generation)
    }

    /// True when the key is outside its throttle window; opens a new window
    /// as a side effect.
    pub(crate) fn throttle(&self, key: &str, window: Duration) -> bool {
        let mut map = self.throttle.lock();
        let now = Instant::now();
        match map.get(key) {
            Some(&opened) if now.duration_since(opened) < window => false,
            _ => {
                map.insert(key.to_string(), now);
                true
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{advance, sleep};

    #[tokio::test(start_paused = true)]
    async fn test_debounce_burst_fires_once_for_the_last_caller() {
        let timing = Arc::new(TimingState::default());
        let quiet = Duration::from_millis(250);

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let timing = Arc::clone(&timing);
            waiters.push(tokio::spawn(async move {
                timing.debounce("pw-auto-0:input:search", quiet).await
            }));
            // events 100ms apart, inside the quiet period
            advance(Duration::from_millis(100)).await;
        }
        advance(quiet).await;

        let mut owners = 0;
        for waiter in waiters {
            if waiter.await.expect("join") {
                owners += 1;
            }
        }
        assert_eq!(owners, 1, "only the last burst member dispatches");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_separate_bursts_each_fire() {
        let timing = Arc::new(TimingState::default());
        let quiet = Duration::from_millis(250);

        let first = {
            let timing = Arc::clone(&timing);
            tokio::spawn(async move { timing.debounce("k:input:h", quiet).await })
        };
        advance(Duration::from_millis(300)).await;
        assert!(first.await.expect("join"));

        let second = {
            let timing = Arc::clone(&timing);
            tokio::spawn(async move { timing.debounce("k:input:h", quiet).await })
        };
        advance(Duration::from_millis(300)).await;
        assert!(second.await.expect("join"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_keys_are_independent() {
        let timing = Arc::new(TimingState::default());
        let quiet = Duration::from_millis(250);

        let a = {
            let timing = Arc::clone(&timing);
            tokio::spawn(async move { timing.debounce("a:input:h", quiet).await })
        };
        let b = {
            let timing = Arc::clone(&timing);
            tokio::spawn(async move { timing.debounce("b:input:h", quiet).await })
        };
        advance(Duration::from_millis(300)).await;
        assert!(a.await.expect("join"));
        assert!(b.await.expect("join"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_opens_then_blocks_then_reopens() {
        let timing = TimingState::default();
        let window = Duration::from_millis(250);

        assert!(timing.throttle("k:scroll:h", window));
        assert!(!timing.throttle("k:scroll:h", window));

        sleep(Duration::from_millis(100)).await;
        assert!(!timing.throttle("k:scroll:h", window));

        sleep(Duration::from_millis(200)).await;
        assert!(timing.throttle("k:scroll:h", window));
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            TimingState::key("pw-auto-3", "input", "search"),
            "pw-auto-3:input:search"
        );
    }
}
