//! Stable node identity for reconciliation.
//!
//! The patcher matches old and new children by a stable key so that a
//! re-rendered page keeps the same live nodes (and with them focus, live
//! form state, and pending debounce timers). The key is derived from the
//! element alone, in fixed precedence:
//!
//! | Precedence | Source | Example key |
//! |------------|--------|-------------|
//! | 1 | first declared handler attribute | `on:click=save_row` |
//! | 2 | author-written element id | `id:sidebar` |
//! | 3 | form control `name`, qualified by tag | `name:input:email` |
//! | 4 | none, matches positionally | |
//!
//! Handler declarations outrank ids because server templates rarely put ids
//! on interactive elements but always declare their handlers. Ids generated
//! by this client (the [`AUTO_ID_PREFIX`] marker) exist only to key debounce
//! and throttle timers; they are preserved across patches but never serve
//! as identity.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::dom::node::ElementData;
use crate::event::EVENT_TYPES;
use crate::event::binding::HANDLER_ATTR_PREFIX;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of element ids generated by this client.
///
/// Assigned by [`Document::ensure_element_id`](crate::dom::Document) when a
/// timer needs a stable key for an id-less element.
pub const AUTO_ID_PREFIX: &str = "pw-auto-";

// ============================================================================
// StableKey
// ============================================================================

/// Stable identity of an element across server renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StableKey {
    /// First declared event handler: event type plus the raw attribute value.
    Handler { event: String, value: String },
    /// Author-written `id` attribute.
    Id(String),
    /// Form control identified by tag and `name` attribute.
    Name { tag: String, name: String },
}

impl fmt::Display for StableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler { event, value } => write!(f, "on:{event}={value}"),
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Name { tag, name } => write!(f, "name:{tag}:{name}"),
        }
    }
}

// ============================================================================
// node_key
// ============================================================================

/// Computes the stable identity key of an element, if it has one.
///
/// Pure over the element's tag and attributes; live form state never feeds
/// the key. Returns `None` for elements that match positionally.
#[must_use]
pub fn node_key(el: &ElementData) -> Option<StableKey> {
    // 1. first declared handler attribute, in document order
    for (name, value) in el.attrs() {
        let Some(event) = name.strip_prefix(HANDLER_ATTR_PREFIX) else {
            continue;
        };
        if value.is_empty() || !EVENT_TYPES.contains(&event) {
            continue;
        }
        return Some(StableKey::Handler {
            event: event.to_string(),
            value: value.to_string(),
        });
    }

    // 2. a real element id; client-generated ids do not count
    if let Some(id) = el.attr("id") {
        if !id.is_empty() && !id.starts_with(AUTO_ID_PREFIX) {
            return Some(StableKey::Id(id.to_string()));
        }
    }

    // 3. a form control's name
    if el.is_form_control() {
        if let Some(name) = el.attr("name") {
            if !name.is_empty() {
                return Some(StableKey::Name {
                    tag: el.tag().to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_attribute_outranks_id_and_name() {
        let el = ElementData::new("input")
            .with_attr("data-on-input", "search")
            .with_attr("id", "q")
            .with_attr("name", "q");
        assert_eq!(
            node_key(&el),
            Some(StableKey::Handler {
                event: "input".to_string(),
                value: "search".to_string(),
            })
        );
    }

    #[test]
    fn test_first_declared_handler_wins() {
        let el = ElementData::new("button")
            .with_attr("data-on-keyup", "arm")
            .with_attr("data-on-click", "fire");
        assert_eq!(
            node_key(&el),
            Some(StableKey::Handler {
                event: "keyup".to_string(),
                value: "arm".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_event_suffix_is_ignored() {
        let el = ElementData::new("div")
            .with_attr("data-on-swipe", "nope")
            .with_attr("id", "panel");
        assert_eq!(node_key(&el), Some(StableKey::Id("panel".to_string())));
    }

    #[test]
    fn test_generated_id_does_not_identify() {
        let el = ElementData::new("input")
            .with_attr("id", "pw-auto-7")
            .with_attr("name", "email");
        assert_eq!(
            node_key(&el),
            Some(StableKey::Name {
                tag: "input".to_string(),
                name: "email".to_string(),
            })
        );
    }

    #[test]
    fn test_name_requires_form_control() {
        let el = ElementData::new("div").with_attr("name", "not-a-control");
        assert_eq!(node_key(&el), None);
    }

    #[test]
    fn test_keyless_element_is_positional() {
        assert_eq!(node_key(&ElementData::new("span")), None);
        // empty values do not count
        let el = ElementData::new("input")
            .with_attr("data-on-click", "")
            .with_attr("id", "")
            .with_attr("name", "");
        assert_eq!(node_key(&el), None);
    }

    #[test]
    fn test_display_forms() {
        let handler = StableKey::Handler {
            event: "click".to_string(),
            value: "save".to_string(),
        };
        assert_eq!(handler.to_string(), "on:click=save");
        assert_eq!(StableKey::Id("a".to_string()).to_string(), "id:a");
        let name = StableKey::Name {
            tag: "select".to_string(),
            name: "size".to_string(),
        };
        assert_eq!(name.to_string(), "name:select:size");
    }
}
