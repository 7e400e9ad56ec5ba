//! Focus and form-state capture around a patch.
//!
//! Taken immediately before reconciliation and consulted during it:
//!
//! - [`FocusSnapshot`] remembers the focused node, its identity key, and its
//!   editing state so focus can be restored onto the same logical element
//!   even when the patch had to replace the node.
//! - [`FormState`] maps every keyed form control to its live value and
//!   checked state at capture time. The patcher reads this map when deciding
//!   whether the server render or the user's in-progress state wins.
//!
//! Both are throwaway values scoped to a single update.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;

use crate::dom::identity::{StableKey, node_key};
use crate::dom::node::{Document, ElementData, NodeId};

// ============================================================================
// FocusSnapshot
// ============================================================================

/// What the user had focused when the update arrived.
#[derive(Debug, Clone)]
pub(crate) struct FocusSnapshot {
    /// The focused node at capture time.
    pub node: NodeId,
    /// Its identity key, for re-finding the element if the node is replaced.
    pub key: Option<StableKey>,
    /// Effective value of the focused control at capture time.
    pub value: Option<String>,
    /// Text selection range at capture time.
    pub selection: Option<(u32, u32)>,
    /// Scroll offsets at capture time.
    pub scroll: (f64, f64),
}

/// Captures the focused element's editing state, if anything is focused.
pub(crate) fn capture_focus(doc: &Document) -> Option<FocusSnapshot> {
    let node = doc.focused()?;
    let el = doc.element(node)?;
    Some(FocusSnapshot {
        node,
        key: node_key(el),
        value: doc.control_value(node),
        selection: el.selection(),
        scroll: el.scroll(),
    })
}

/// Restores focus onto the same logical element after a patch.
///
/// Prefers the original node when it survived; otherwise re-finds the
/// element by identity key. Selection is only re-applied to text controls,
/// mirroring how browsers reject selection-range calls on anything else.
pub(crate) fn restore_focus(doc: &mut Document, snapshot: &FocusSnapshot) {
    let target = if doc.contains(snapshot.node) {
        Some(snapshot.node)
    } else {
        snapshot.key.as_ref().and_then(|key| find_by_key(doc, key))
    };
    let Some(target) = target else { return };

    let _ = doc.focus(target);
    if doc.element(target).is_some_and(ElementData::is_text_entry) {
        if let Some((start, end)) = snapshot.selection {
            let _ = doc.set_selection(target, start, end);
        }
    }
    let _ = doc.set_scroll(target, snapshot.scroll.0, snapshot.scroll.1);
}

/// First element in document order whose identity key matches.
pub(crate) fn find_by_key(doc: &Document, key: &StableKey) -> Option<NodeId> {
    doc.subtree(doc.root()).into_iter().find(|&id| {
        doc.element(id)
            .is_some_and(|el| node_key(el).as_ref() == Some(key))
    })
}

// ============================================================================
// FormState
// ============================================================================

/// Live state of every keyed form control at capture time.
///
/// Controls without an identity key are not captured; for those, a patch
/// matched positionally lets the server render win.
#[derive(Debug, Default)]
pub(crate) struct FormState {
    controls: FxHashMap<StableKey, ControlState>,
}

/// One control's captured state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ControlState {
    pub value: String,
    pub checked: bool,
}

impl FormState {
    /// Captured effective value of a keyed control.
    pub(crate) fn value(&self, key: &StableKey) -> Option<&str> {
        self.controls.get(key).map(|state| state.value.as_str())
    }

    /// Captured effective checked state of a keyed control.
    pub(crate) fn checked(&self, key: &StableKey) -> Option<bool> {
        self.controls.get(key).map(|state| state.checked)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.controls.len()
    }
}

/// Walks the document and captures every keyed `<input>`, `<textarea>`,
/// and `<select>`. On duplicate keys the first control in document order
/// wins, matching how the patcher indexes keyed children.
pub(crate) fn capture_form_state(doc: &Document) -> FormState {
    let mut controls = FxHashMap::default();
    for id in doc.subtree(doc.root()) {
        let Some(el) = doc.element(id) else { continue };
        if !el.is_form_control() {
            continue;
        }
        let Some(key) = node_key(el) else { continue };
        let state = ControlState {
            value: doc.control_value(id).unwrap_or_default(),
            checked: el.effective_checked(),
        };
        controls.entry(key).or_insert(state);
    }
    FormState { controls }
}

// ============================================================================
// Tests
// ============================================================================
