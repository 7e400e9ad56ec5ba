//! Handler modifier parsing.
//!
//! Modifiers arrive as space-separated tokens, either in a legacy
//! `data-modifiers-<event>` attribute or inside a JSON binding entry:
//!
//! ```text
//! "prevent stop self"            behavior flags
//! "window" / "outside"           scope: fire globally / outside the subtree
//! "shift ctrl alt meta"          required system keys
//! "enter esc up q"               key filters (keyboard events)
//! "debounce-500ms" / "debounce 500ms"   both duration syntaxes
//! "throttle-1000ms" / "throttle 1000ms"
//! ```
//!
//! A bare duration token (`500ms`) attaches to the immediately preceding
//! `debounce`/`throttle`; on its own it is ignored. Unknown tokens are
//! skipped so newer server vocabularies degrade gracefully.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::debug;

use crate::event::keys::KeyFilter;

// ============================================================================
// Constants
// ============================================================================

/// Quiet period used when `debounce` is declared without a duration.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Window used when `throttle` is declared without a duration.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);

// ============================================================================
// Scope
// ============================================================================

/// Where a handler listens relative to its declaring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Fires when the event propagates through the declaring element.
    #[default]
    Local,
    /// Fires for every event of the type, anywhere in the document.
    Window,
    /// Fires when the target lies outside the declaring element's subtree.
    Outside,
}

// ============================================================================
// ModifierSet
// ============================================================================

/// Parsed modifiers of one handler binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifierSet {
    pub prevent: bool,
    pub stop: bool,
    /// Only fire when the direct target is the declaring element.
    pub self_only: bool,
    pub scope: Scope,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    /// Key filters; for keyboard events the key must match one of them.
    pub keys: Vec<KeyFilter>,
    pub debounce: Option<Duration>,
    pub throttle: Option<Duration>,
}

/// The timing token a bare duration can attach to.
#[derive(Clone, Copy, PartialEq)]
enum TimingSlot {
    Debounce,
    Throttle,
}

impl ModifierSet {
    /// Parses a space-separated modifier list.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut set = Self::default();
        let mut last_timing = None;
        for token in raw.split_ascii_whitespace() {
            let token = token.to_ascii_lowercase();
            let timing = set.apply_token(&token, last_timing);
            last_timing = timing;
        }
        set
    }

    /// Applies one token; returns the timing slot a following bare duration
    /// would attach to.
    fn apply_token(&mut self, token: &str, last_timing: Option<TimingSlot>) -> Option<TimingSlot> {
        match token {
            "prevent" => self.prevent = true,
            "stop" => self.stop = true,
            "self" => self.self_only = true,
            "window" => self.scope = Scope::Window,
            "outside" => self.scope = Scope::Outside,
            "shift" => self.shift = true,
            "ctrl" | "control" => self.ctrl = true,
            "alt" => self.alt = true,
            "meta" | "cmd" => self.meta = true,
            "debounce" => {
                self.debounce.get_or_insert(DEFAULT_DEBOUNCE);
                return Some(TimingSlot::Debounce);
            }
            "throttle" => {
                self.throttle.get_or_insert(DEFAULT_THROTTLE);
                return Some(TimingSlot::Throttle);
            }
            _ => {
                if let Some(rest) = token.strip_prefix("debounce-") {
                    match parse_duration(rest) {
                        Some(duration) => self.debounce = Some(duration),
                        None => debug!(token, "Ignoring malformed debounce duration"),
                    }
                    return None;
                }
                if let Some(rest) = token.strip_prefix("throttle-") {
                    match parse_duration(rest) {
                        Some(duration) => self.throttle = Some(duration),
                        None => debug!(token, "Ignoring malformed throttle duration"),
                    }
                    return None;
                }
                if let Some(duration) = parse_duration(token) {
                    match last_timing {
                        Some(TimingSlot::Debounce) => self.debounce = Some(duration),
                        Some(TimingSlot::Throttle) => self.throttle = Some(duration),
                        None => debug!(token, "Ignoring dangling duration token"),
                    }
                    return None;
                }
                match KeyFilter::parse(token) {
                    Some(filter) => self.keys.push(filter),
                    None => debug!(token, "Ignoring unknown modifier token"),
                }
            }
        }
        None
    }
}

/// Parses `500ms` or a bare millisecond count.
fn parse_duration(token: &str) -> Option<Duration> {
    let digits = token.strip_suffix("ms").unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().map(Duration::from_millis)
}

// ============================================================================
// Tests
// ============================================================================
