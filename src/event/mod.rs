//! Unified event handling.
//!
//! Every user interaction, synthetic or replayed, funnels through one
//! dispatcher:
//!
//! ```text
//!   SyntheticEvent ──▶ suppression ──▶ path walk ──▶ per-entry pipeline
//!                      (updating)      + doc scan     prevent → stop →
//!                                     (window/outside) self → system keys →
//!                                                      key filters →
//!                                                      debounce → throttle
//!                                                           │
//!                                                           ▼
//!                                                   DispatchedEvent ──▶ shell
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | `binding` | `data-on-*` legacy and JSON binding parse |
//! | `modifiers` | Modifier token vocabulary |
//! | `keys` | Key constants and key-filter matching |
//! | `timing` | Debounce and throttle bookkeeping |
//! | `dispatcher` | Propagation walk and the entry pipeline |

// ============================================================================
// Submodules
// ============================================================================

/// Handler binding parse.
pub(crate) mod binding;

/// Event dispatch.
pub mod dispatcher;

/// Keys and key filters.
pub mod keys;

/// Modifier vocabulary.
pub mod modifiers;

/// Debounce and throttle state.
pub(crate) mod timing;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{
    DispatchReport, DispatchedEvent, EventDispatcher, KeyPress, SyntheticEvent,
};
pub use keys::{Key, KeyFilter};
pub use modifiers::{DEFAULT_DEBOUNCE, DEFAULT_THROTTLE, ModifierSet, Scope};

// ============================================================================
// EventType
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Event type names in their fixed precedence order.
///
/// The same order decides which declared handler identifies an element
/// during reconciliation. Aligned with [`EventType::ALL`].
pub const EVENT_TYPES: [&str; 12] = [
    "click",
    "submit",
    "input",
    "change",
    "keydown",
    "keyup",
    "focus",
    "blur",
    "mouseenter",
    "mouseleave",
    "scroll",
    "contextmenu",
];

/// The closed set of event types the runtime understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Click,
    Submit,
    Input,
    Change,
    KeyDown,
    KeyUp,
    Focus,
    Blur,
    MouseEnter,
    MouseLeave,
    Scroll,
    ContextMenu,
}

impl EventType {
    /// Every supported event type, in [`EVENT_TYPES`] order.
    pub const ALL: [EventType; 12] = [
        EventType::Click,
        EventType::Submit,
        EventType::Input,
        EventType::Change,
        EventType::KeyDown,
        EventType::KeyUp,
        EventType::Focus,
        EventType::Blur,
        EventType::MouseEnter,
        EventType::MouseLeave,
        EventType::Scroll,
        EventType::ContextMenu,
    ];

    /// The DOM event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::Submit => "submit",
            EventType::Input => "input",
            EventType::Change => "change",
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::MouseEnter => "mouseenter",
            EventType::MouseLeave => "mouseleave",
            EventType::Scroll => "scroll",
            EventType::ContextMenu => "contextmenu",
        }
    }

    /// True for `keydown` and `keyup`.
    #[must_use]
    pub fn is_keyboard(self) -> bool {
        matches!(self, EventType::KeyDown | EventType::KeyUp)
    }

    /// Types listened for in the capture phase, because their bubbling is
    /// unreliable or absent in real DOMs.
    #[must_use]
    pub fn uses_capture(self) -> bool {
        matches!(
            self,
            EventType::Focus
                | EventType::Blur
                | EventType::MouseEnter
                | EventType::MouseLeave
                | EventType::Scroll
        )
    }

    /// Types dropped entirely while a patch is being applied, because the
    /// patch itself raises them as focus and hover churn.
    #[must_use]
    pub fn suppressed_while_updating(self) -> bool {
        matches!(
            self,
            EventType::Focus
                | EventType::Blur
                | EventType::MouseEnter
                | EventType::MouseLeave
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| Error::config(format!("unknown event type: {s}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types_align_with_enum() {
        assert_eq!(EventType::ALL.len(), EVENT_TYPES.len());
        for (ty, name) in EventType::ALL.into_iter().zip(EVENT_TYPES) {
            assert_eq!(ty.as_str(), name);
        }
    }

    #[test]
    fn test_from_str_round_trips() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
        assert!("hover".parse::<EventType>().is_err());
    }

    #[test]
    fn test_suppressed_set_is_focus_and_hover() {
        let suppressed: Vec<_> = EventType::ALL
            .into_iter()
            .filter(|ty| ty.suppressed_while_updating())
            .collect();
        assert_eq!(
            suppressed,
            vec![
                EventType::Focus,
                EventType::Blur,
                EventType::MouseEnter,
                EventType::MouseLeave,
            ]
        );
    }

    #[test]
    fn test_capture_set_includes_scroll() {
        assert!(EventType::Scroll.uses_capture());
        assert!(EventType::Focus.uses_capture());
        assert!(!EventType::Click.uses_capture());
        assert!(!EventType::Submit.uses_capture());
    }
}
