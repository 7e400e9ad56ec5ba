//! Keyed tree reconciliation.
//!
//! Morphs the live document into the shape of an incoming render while
//! keeping as many live nodes as possible. The walk runs old and new trees
//! in lockstep:
//!
//! ```text
//!   patch_node            compatible pair: same kind, same tag
//!    ├─ sync attributes   server attrs win; generated ids survive
//!    ├─ preserve state    checked always live; focused value by prefix
//!    ├─ patch children    keyed match first, positional for the rest
//!    └─ preserve select   live selection kept while still a valid option
//! ```
//!
//! Child matching: every keyed old child is indexed by its identity key
//! and only ever matches that key. Keyless children match positionally
//! against kind-compatible keyless old children, consuming skipped ones.
//! Old children left unmatched are removed; unmatched new children are
//! imported. The child order always ends up as the incoming order.
//!
//! Any structural error (dangling index, nesting past the depth guard)
//! aborts the patch; the updater then falls back to replacing the whole
//! document rather than leaving a half-patched tree.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dom::identity::{AUTO_ID_PREFIX, StableKey, node_key};
use crate::dom::node::{Document, NodeId, NodeKind};
use crate::dom::snapshot::{FocusSnapshot, FormState};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Maximum element nesting the patcher will walk.
pub(crate) const MAX_PATCH_DEPTH: u32 = 512;

// ============================================================================
// reconcile
// ============================================================================

/// Patches `live` in place to match `incoming`.
///
/// `focus` and `state` are the snapshots captured from `live` immediately
/// before the call; they drive the user-state preservation rules.
pub(crate) fn reconcile(
    live: &mut Document,
    incoming: &Document,
    focus: Option<&FocusSnapshot>,
    state: &FormState,
) -> Result<()> {
    let old_root = live.root();
    let new_root = incoming.root();
    let compat = match (live.kind(old_root), incoming.kind(new_root)) {
        (Some(a), Some(b)) => compatible(a, b),
        _ => false,
    };
    if !compat {
        return Err(Error::patch("root elements are not compatible"));
    }
    let mut patcher = Patcher {
        live,
        incoming,
        focus,
        state,
    };
    patcher.patch_node(old_root, new_root, 0)
}

/// True when a pair of nodes can be patched rather than replaced.
fn compatible(old: &NodeKind, new: &NodeKind) -> bool {
    match (old, new) {
        (NodeKind::Element(a), NodeKind::Element(b)) => a.tag() == b.tag(),
        (NodeKind::Text(_), NodeKind::Text(_))
        | (NodeKind::Comment(_), NodeKind::Comment(_)) => true,
        _ => false,
    }
}

// ============================================================================
// Patcher
// ============================================================================

struct Patcher<'a> {
    live: &'a mut Document,
    incoming: &'a Document,
    focus: Option<&'a FocusSnapshot>,
    state: &'a FormState,
}

impl Patcher<'_> {
    /// Patches one compatible pair of nodes.
    fn patch_node(&mut self, old_id: NodeId, new_id: NodeId, depth: u32) -> Result<()> {
        if depth > MAX_PATCH_DEPTH {
            return Err(Error::patch(format!(
                "tree nesting exceeds {MAX_PATCH_DEPTH}"
            )));
        }
        let (Some(old_kind), Some(new_kind)) =
            (self.live.kind(old_id), self.incoming.kind(new_id))
        else {
            return Err(Error::patch("dangling node during patch"));
        };
        match (old_kind, new_kind) {
            (NodeKind::Text(old), NodeKind::Text(new))
            | (NodeKind::Comment(old), NodeKind::Comment(new)) => {
                if old != new {
                    let replacement = new.clone();
                    match self.live.kind_mut(old_id) {
                        Some(NodeKind::Text(slot) | NodeKind::Comment(slot)) => {
                            *slot = replacement;
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
            (NodeKind::Element(_), NodeKind::Element(_)) => {
                self.patch_element(old_id, new_id, depth)
            }
            _ => Err(Error::patch("mismatched node kinds during patch")),
        }
    }

    fn patch_element(&mut self, old_id: NodeId, new_id: NodeId, depth: u32) -> Result<()> {
        self.sync_attributes(old_id, new_id);
        self.preserve_control_state(old_id, new_id);
        self.patch_children(old_id, new_id, depth)?;
        self.preserve_select_state(old_id, new_id);
        Ok(())
    }

    /// Makes the old element's attributes match the incoming element.
    ///
    /// A client-generated id survives when the incoming element carries no
    /// id of its own, keeping debounce and throttle timer keys stable.
    fn sync_attributes(&mut self, old_id: NodeId, new_id: NodeId) {
        let Some(new_el) = self.incoming.element(new_id) else { return };
        let new_attrs: Vec<(String, String)> = new_el
            .attrs()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let keep_generated_id = new_el.attr("id").is_none()
            && self
                .live
                .element(old_id)
                .and_then(|el| el.attr("id"))
                .is_some_and(|id| id.starts_with(AUTO_ID_PREFIX));

        let Some(old_el) = self.live.element_mut(old_id) else { return };
        let old_names: Vec<String> = old_el.attrs().map(|(n, _)| n.to_string()).collect();
        for name in old_names {
            let retained = new_attrs.iter().any(|(n, _)| *n == name)
                || (keep_generated_id && name == "id");
            if !retained {
                old_el.remove_attr(&name);
            }
        }
        for (name, value) in &new_attrs {
            old_el.set_attr(name, value);
        }
    }

    /// Applies the user-state preservation rules to a matched pair.
    ///
    /// Checkboxes and radios always keep the live checked state. A focused
    /// text control keeps its live value while one value is a prefix of the
    /// other (the user is still typing); in every other case the server
    /// render wins and the live override is dropped.
    fn preserve_control_state(&mut self, old_id: NodeId, new_id: NodeId) {
        let (key, checkable, text_entry, fallback_checked) = {
            let Some(el) = self.live.element(old_id) else { return };
            (
                node_key(el),
                el.is_checkable(),
                el.is_text_entry(),
                el.effective_checked(),
            )
        };

        if checkable {
            let live = key
                .as_ref()
                .and_then(|k| self.state.checked(k))
                .unwrap_or(fallback_checked);
            if let Some(el) = self.live.element_mut(old_id) {
                el.checked = Some(live);
            }
            return;
        }

        if !text_entry {
            return;
        }

        let focused = self.focus.is_some_and(|f| f.node == old_id);
        let keep_live = focused && {
            let live = key
                .as_ref()
                .and_then(|k| self.state.value(k))
                .map(str::to_string)
                .or_else(|| self.focus.and_then(|f| f.value.clone()))
                .unwrap_or_default();
            let incoming = self.incoming.control_value(new_id).unwrap_or_default();
            live.starts_with(&incoming) || incoming.starts_with(&live)
        };
        if !keep_live {
            if let Some(el) = self.live.element_mut(old_id) {
                el.value = None;
                el.selection = None;
            }
        }
    }

    /// Keeps a select's live selection while it is still a valid option.
    ///
    /// Runs after the children patch because the valid option set is the
    /// incoming one.
    fn preserve_select_state(&mut self, old_id: NodeId, new_id: NodeId) {
        let captured = {
            let Some(el) = self.live.element(old_id) else { return };
            if el.tag() != "select" {
                return;
            }
            node_key(el)
                .as_ref()
                .and_then(|k| self.state.value(k))
                .map(str::to_string)
                .or_else(|| el.live_value().map(str::to_string))
        };
        let Some(captured) = captured else { return };
        let keep = self
            .incoming
            .option_values(new_id)
            .iter()
            .any(|v| *v == captured);
        if let Some(el) = self.live.element_mut(old_id) {
            el.value = if keep { Some(captured) } else { None };
        }
    }

    /// Reconciles the child lists of a matched element pair.
    fn patch_children(&mut self, old_id: NodeId, new_id: NodeId, depth: u32) -> Result<()> {
        let old_children: Vec<NodeId> = self.live.children(old_id).to_vec();
        let new_children: Vec<NodeId> = self.incoming.children(new_id).to_vec();

        let mut keyed: FxHashMap<StableKey, NodeId> = FxHashMap::default();
        for &child in &old_children {
            if let Some(key) = self.live.element(child).and_then(node_key) {
                keyed.entry(key).or_insert(child);
            }
        }

        let mut claimed: FxHashSet<NodeId> = FxHashSet::default();
        let mut assembled: Vec<NodeId> = Vec::with_capacity(new_children.len());
        let mut cursor = 0usize;

        for &new_child in &new_children {
            let new_key = self.incoming.element(new_child).and_then(node_key);

            let matched = match &new_key {
                Some(key) => keyed
                    .get(key)
                    .copied()
                    .filter(|c| !claimed.contains(c))
                    .filter(|&c| self.pair_compatible(c, new_child)),
                None => {
                    let mut found = None;
                    while cursor < old_children.len() {
                        let candidate = old_children[cursor];
                        cursor += 1;
                        if claimed.contains(&candidate) {
                            continue;
                        }
                        // keyed children only ever match by key
                        if self.live.element(candidate).and_then(node_key).is_some() {
                            continue;
                        }
                        if self.pair_compatible(candidate, new_child) {
                            found = Some(candidate);
                            break;
                        }
                    }
                    found
                }
            };

            match matched {
                Some(old_child) => {
                    claimed.insert(old_child);
                    self.patch_node(old_child, new_child, depth + 1)?;
                    assembled.push(old_child);
                }
                None => {
                    let Some(imported) = self.live.import_subtree(self.incoming, new_child)
                    else {
                        return Err(Error::patch("dangling incoming node"));
                    };
                    assembled.push(imported);
                }
            }
        }

        for &child in &old_children {
            if !claimed.contains(&child) {
                self.live.remove_subtree(child);
            }
        }
        self.live.set_children(old_id, assembled);
        Ok(())
    }

    fn pair_compatible(&self, old_id: NodeId, new_id: NodeId) -> bool {
        match (self.live.kind(old_id), self.incoming.kind(new_id)) {
            (Some(a), Some(b)) => compatible(a, b),
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::snapshot::{capture_focus, capture_form_state, restore_focus};

    fn page(body: &str) -> Document {
        Document::parse(&format!(
            "<!DOCTYPE html><html><head></head><body>{body}</body></html>"
        ))
    }

    /// Runs the same capture / patch / restore sequence the updater uses.
    fn apply(live: &mut Document, body: &str) -> Result<()> {
        let incoming = page(body);
        let focus = capture_focus(live);
        let state = capture_form_state(live);
        reconcile(live, &incoming, focus.as_ref(), &state)?;
        if let Some(focus) = &focus {
            restore_focus(live, focus);
        }
        Ok(())
    }

    #[test]
    fn test_text_updates_in_place() {
        let mut doc = page("<p id=\"msg\">old</p>");
        let p = doc.by_id("msg").expect("p");

        apply(&mut doc, "<p id=\"msg\">new</p>").expect("patch");
        assert!(doc.contains(p), "node survives the patch");
        assert_eq!(doc.text_content(p), "new");
    }

    #[test]
    fn test_keyed_reorder_preserves_nodes() {
        let mut doc = page(
            "<ul><li id=\"a\">A</li><li id=\"b\">B</li><li id=\"c\">C</li></ul>",
        );
        let a = doc.by_id("a").expect("a");
        let b = doc.by_id("b").expect("b");
        let c = doc.by_id("c").expect("c");

        apply(
            &mut doc,
            "<ul><li id=\"c\">C</li><li id=\"a\">A2</li><li id=\"b\">B</li></ul>",
        )
        .expect("patch");

        let ul = doc.query("ul").expect("ul");
        assert_eq!(doc.children(ul), &[c, a, b]);
        assert_eq!(doc.text_content(a), "A2");
    }

    #[test]
    fn test_unmatched_children_removed_and_created() {
        let mut doc = page("<div id=\"box\"><span id=\"gone\">x</span></div>");
        let gone = doc.by_id("gone").expect("span");

        apply(&mut doc, "<div id=\"box\"><em id=\"fresh\">y</em></div>").expect("patch");
        assert!(!doc.contains(gone));
        let fresh = doc.by_id("fresh").expect("em");
        assert_eq!(doc.text_content(fresh), "y");
    }

    #[test]
    fn test_attribute_sync_adds_updates_and_removes() {
        let mut doc = page("<div id=\"box\" class=\"old\" data-stale=\"1\"></div>");
        let div = doc.by_id("box").expect("div");

        apply(&mut doc, "<div id=\"box\" class=\"new\" title=\"hi\"></div>").expect("patch");
        let el = doc.element(div).expect("el");
        assert_eq!(el.attr("class"), Some("new"));
        assert_eq!(el.attr("title"), Some("hi"));
        assert_eq!(el.attr("data-stale"), None);
    }

    #[test]
    fn test_focused_value_kept_while_typing() {
        let mut doc = page("<input name=\"q\" value=\"he\">");
        let input = doc.query("input").expect("input");
        doc.focus(input).expect("focus");
        doc.set_value(input, "hell").expect("set_value");

        // server echoes the older prefix back
        apply(&mut doc, "<input name=\"q\" value=\"he\">").expect("patch");
        assert_eq!(doc.control_value(input).as_deref(), Some("hell"));

        // server is ahead of the live value: still a prefix pair
        apply(&mut doc, "<input name=\"q\" value=\"hello\">").expect("patch");
        assert_eq!(doc.control_value(input).as_deref(), Some("hell"));
    }

    #[test]
    fn test_focused_value_replaced_when_not_a_prefix() {
        let mut doc = page("<input name=\"q\" value=\"\">");
        let input = doc.query("input").expect("input");
        doc.focus(input).expect("focus");
        doc.set_value(input, "draft").expect("set_value");

        apply(&mut doc, "<input name=\"q\" value=\"reset\">").expect("patch");
        assert_eq!(doc.control_value(input).as_deref(), Some("reset"));
        assert_eq!(doc.element(input).expect("el").live_value(), None);
    }

    #[test]
    fn test_unfocused_value_always_takes_server_render() {
        let mut doc = page("<input name=\"q\" value=\"\">");
        let input = doc.query("input").expect("input");
        doc.set_value(input, "typed").expect("set_value");

        // "typed" has "" as a prefix, but the control is not focused
        apply(&mut doc, "<input name=\"q\" value=\"\">").expect("patch");
        assert_eq!(doc.control_value(input).as_deref(), Some(""));
    }

    #[test]
    fn test_checkbox_keeps_live_checked_both_ways() {
        let mut doc = page(
            "<input id=\"c1\" type=\"checkbox\">\
             <input id=\"c2\" type=\"checkbox\" checked=\"\">",
        );
        let c1 = doc.by_id("c1").expect("c1");
        let c2 = doc.by_id("c2").expect("c2");
        doc.set_checked(c1, true).expect("check");
        doc.set_checked(c2, false).expect("uncheck");

        // server renders the opposite of both live states
        apply(
            &mut doc,
            "<input id=\"c1\" type=\"checkbox\">\
             <input id=\"c2\" type=\"checkbox\" checked=\"\">",
        )
        .expect("patch");
        assert!(doc.element(c1).expect("c1").effective_checked());
        assert!(!doc.element(c2).expect("c2").effective_checked());
    }

    #[test]
    fn test_select_keeps_selection_while_option_exists() {
        let mut doc = page(
            "<select name=\"s\"><option value=\"a\">A</option>\
             <option value=\"b\">B</option></select>",
        );
        let select = doc.query("select").expect("select");
        doc.select_value(select, "b").expect("select_value");

        apply(
            &mut doc,
            "<select name=\"s\"><option value=\"a\">A</option>\
             <option value=\"b\">B</option><option value=\"c\">C</option></select>",
        )
        .expect("patch");
        assert_eq!(doc.control_value(select).as_deref(), Some("b"));

        // the selected option disappears: server default wins
        apply(
            &mut doc,
            "<select name=\"s\"><option value=\"a\">A</option></select>",
        )
        .expect("patch");
        assert_eq!(doc.control_value(select).as_deref(), Some("a"));
    }

    #[test]
    fn test_generated_id_survives_patch() {
        let mut doc = page("<button data-on-click=\"go\">Go</button>");
        let button = doc.query("button").expect("button");
        doc.ensure_element_id(button);
        assert_eq!(
            doc.element(button).and_then(|el| el.attr("id")),
            Some("pw-auto-0")
        );

        apply(&mut doc, "<button data-on-click=\"go\">Go!</button>").expect("patch");
        assert_eq!(
            doc.element(button).and_then(|el| el.attr("id")),
            Some("pw-auto-0")
        );
        assert_eq!(doc.text_content(button), "Go!");

        // a server-rendered id beats the generated one
        apply(&mut doc, "<button id=\"real\" data-on-click=\"go\">Go!</button>")
            .expect("patch");
        assert_eq!(
            doc.element(button).and_then(|el| el.attr("id")),
            Some("real")
        );
    }

    #[test]
    fn test_focus_restored_onto_replacement_with_same_key() {
        let mut doc = page("<div><input name=\"q\" value=\"x\"></div>");
        let old_input = doc.query("input").expect("input");
        doc.focus(old_input).expect("focus");

        // parent tag changes, so the whole subtree is replaced
        apply(&mut doc, "<section><input name=\"q\" value=\"x\"></section>")
            .expect("patch");
        assert!(!doc.contains(old_input));
        let new_input = doc.query("input").expect("new input");
        assert_eq!(doc.focused(), Some(new_input));
    }

    #[test]
    fn test_keyed_element_never_matches_positionally() {
        let mut doc = page("<div><input name=\"a\" value=\"\"></div>");
        let keyed = doc.query("input").expect("input");
        doc.set_value(keyed, "mine").expect("set_value");
        doc.focus(keyed).expect("focus");

        // the incoming child is a keyless input; the keyed live child must
        // not be reused for it
        apply(&mut doc, "<div><input value=\"\"></div>").expect("patch");
        assert!(!doc.contains(keyed));
        let replacement = doc.query("input").expect("input");
        assert_eq!(doc.control_value(replacement).as_deref(), Some(""));
    }

    #[test]
    fn test_depth_guard_aborts_patch() {
        let deep = "<div>".repeat(MAX_PATCH_DEPTH as usize + 8)
            + &"</div>".repeat(MAX_PATCH_DEPTH as usize + 8);
        let mut doc = page(&deep);
        let incoming = page(&deep);
        let state = capture_form_state(&doc);

        let err = reconcile(&mut doc, &incoming, None, &state).expect_err("too deep");
        assert!(matches!(err, Error::Patch { .. }));
    }

    #[test]
    fn test_whitespace_and_comments_match_positionally() {
        let mut doc = page("<div> <!-- note --> <b>x</b></div>");
        apply(&mut doc, "<div> <!-- changed --> <b>y</b></div>").expect("patch");
        let b = doc.query("b").expect("b");
        assert_eq!(doc.text_content(b), "y");
        let html = doc.serialize();
        assert!(html.contains("<!-- changed -->"), "{html}");
    }
}
