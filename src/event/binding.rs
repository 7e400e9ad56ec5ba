//! Handler binding attributes.
//!
//! Server templates declare handlers in one of two shapes:
//!
//! ```html
//! <!-- legacy: one handler, modifiers and args in sibling attributes -->
//! <button data-on-click="save" data-modifiers-click="prevent debounce-500ms"
//!         data-arg-row="42">
//!
//! <!-- JSON: several handlers per event, everything inline -->
//! <div data-on-click='[{"handler":"open","modifiers":["stop"],"args":[1]}]'>
//! ```
//!
//! JSON entries carry their own args (positional items keyed `"0"`, `"1"`,
//! ...); `data-arg-*` attributes feed the legacy form only. A value that
//! looks like JSON but fails to parse falls back to the legacy reading.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::debug;

use crate::dom::ElementData;
use crate::event::EventType;
use crate::event::modifiers::ModifierSet;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of handler declaration attributes.
pub(crate) const HANDLER_ATTR_PREFIX: &str = "data-on-";

/// Prefix of legacy modifier attributes.
pub(crate) const MODIFIER_ATTR_PREFIX: &str = "data-modifiers-";

/// Prefix of legacy argument attributes.
pub(crate) const ARG_ATTR_PREFIX: &str = "data-arg-";

// ============================================================================
// Binding
// ============================================================================

/// One handler bound to an element for one event type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Binding {
    /// Server-side handler name.
    pub handler: String,
    pub modifiers: ModifierSet,
    /// Declared arguments, forwarded verbatim in the event payload.
    pub args: Map<String, Value>,
}

/// Reads every handler the element declares for one event type, in
/// declaration order.
pub(crate) fn bindings_for(el: &ElementData, event_type: EventType) -> Vec<Binding> {
    let attr = format!("{HANDLER_ATTR_PREFIX}{}", event_type.as_str());
    let Some(raw) = el.attr(&attr) else {
        return Vec::new();
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    if raw.starts_with('[') {
        if let Some(bindings) = parse_json_bindings(raw) {
            return bindings;
        }
        debug!(attr = %attr, "Malformed JSON binding. Treating the value as a handler name");
    }

    let modifiers = el
        .attr(&format!("{MODIFIER_ATTR_PREFIX}{}", event_type.as_str()))
        .map(ModifierSet::parse)
        .unwrap_or_default();
    vec![Binding {
        handler: raw.to_string(),
        modifiers,
        args: element_args(el),
    }]
}

fn parse_json_bindings(raw: &str) -> Option<Vec<Binding>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let entries = value.as_array()?;
    let mut bindings = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(handler) = entry.get("handler").and_then(Value::as_str) else {
            debug!("Skipping JSON binding entry without a handler name");
            continue;
        };
        let modifiers = match entry.get("modifiers") {
            Some(Value::Array(tokens)) => {
                let joined = tokens
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                ModifierSet::parse(&joined)
            }
            Some(Value::String(tokens)) => ModifierSet::parse(tokens),
            _ => ModifierSet::default(),
        };
        let args = match entry.get("args") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item.clone()))
                .collect(),
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        bindings.push(Binding {
            handler: handler.to_string(),
            modifiers,
            args,
        });
    }
    Some(bindings)
}

/// Collects `data-arg-*` attributes. Values are JSON-decoded, with a raw
/// string fallback for anything that does not parse.
fn element_args(el: &ElementData) -> Map<String, Value> {
    let mut args = Map::new();
    for (name, value) in el.attrs() {
        let Some(arg_name) = name.strip_prefix(ARG_ATTR_PREFIX) else {
            continue;
        };
        if arg_name.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        args.insert(arg_name.to_string(), parsed);
    }
    args
}

// ============================================================================
// Tests
// ============================================================================
