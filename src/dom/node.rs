//! In-memory HTML document.
//!
//! The document is an arena: every node lives in one `Vec`, and nodes refer
//! to each other through [`NodeId`] indices. Patching never invalidates the
//! ids of surviving nodes, which is what lets focus capture, form-state
//! capture, and pending event targets hold a `NodeId` across an update.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`Document`] | Arena, tree structure, queries, serialization |
//! | [`NodeKind`] | Element, text, or comment payload of a node |
//! | [`ElementData`] | Tag, attributes, and live form state |
//! | [`AttachedFile`] | In-memory file held by an `<input type="file">` |
//!
//! Live form state (value, checked state, text selection, scroll offsets,
//! attached files) is kept next to the attributes rather than in them, the
//! same way a browser separates DOM properties from markup. Serialization
//! writes attributes only, so a control the user has typed into still
//! serializes with its server-rendered `value` attribute.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use ego_tree::NodeRef;
use scraper::{Html, Node as HtmlNode};

use crate::dom::identity::AUTO_ID_PREFIX;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "param", "source", "track", "wbr",
];

/// Elements whose text children are written verbatim when serializing.
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

/// Input types treated as free-text entry.
///
/// Only these (plus `<textarea>`) participate in focused-value preservation
/// during a patch.
const TEXT_ENTRY_INPUT_TYPES: [&str; 9] = [
    "text", "search", "password", "email", "url", "tel", "number", "date", "time",
];

// ============================================================================
// NodeId
// ============================================================================

/// Index of a node in a [`Document`] arena.
///
/// Ids are never reused within one document: removing a subtree tombstones
/// its slots. An id taken from one document is meaningless in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// AttachedFile
// ============================================================================

/// In-memory file attached to an `<input type="file">`.
///
/// Held on the element until the owning form is submitted, at which point
/// the upload flow ships the bytes and replaces them with a server-issued
/// upload id in the event's form data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    /// File name reported to the server.
    pub name: String,
    /// MIME type sent with the multipart part.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl AttachedFile {
    /// Creates a file with an explicit MIME type.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

// ============================================================================
// ElementData
// ============================================================================

/// Tag, attributes, and live form state of one element.
///
/// Attributes are stored in document order with lowercase names. The live
/// fields shadow their attribute counterparts: a `None` live value means
/// "whatever the `value` attribute says".
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    pub(crate) value: Option<String>,
    pub(crate) checked: Option<bool>,
    pub(crate) selection: Option<(u32, u32)>,
    pub(crate) scroll: (f64, f64),
    pub(crate) files: Vec<AttachedFile>,
}

impl ElementData {
    /// Creates an element with no attributes. The tag is lowercased.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            value: None,
            checked: None,
            selection: None,
            scroll: (0.0, 0.0),
            files: Vec::new(),
        }
    }

    /// Builder-style attribute setter, mainly for constructing test fixtures.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Lowercase tag name.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Looks up an attribute by name, case-insensitively.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Sets an attribute, replacing any existing value. Names are lowercased.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((name, value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterates attributes in document order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Iterates the whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    /// The `type` attribute of an `<input>`, defaulting to `text`.
    #[must_use]
    pub fn input_type(&self) -> &str {
        self.attr("type").unwrap_or("text")
    }

    /// True for `<input>`, `<textarea>`, and `<select>`.
    #[must_use]
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }

    /// True when the element takes free text.
    #[must_use]
    pub fn is_text_entry(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => TEXT_ENTRY_INPUT_TYPES.contains(&self.input_type()),
            _ => false,
        }
    }

    /// True for checkbox and radio inputs.
    #[must_use]
    pub fn is_checkable(&self) -> bool {
        self.tag == "input" && matches!(self.input_type(), "checkbox" | "radio")
    }

    /// Live value override, if the control has been typed into.
    #[inline]
    #[must_use]
    pub fn live_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Live checked override, if the control has been toggled.
    #[inline]
    #[must_use]
    pub fn live_checked(&self) -> Option<bool> {
        self.checked
    }

    /// Live checked state, falling back to the `checked` attribute.
    #[must_use]
    pub fn effective_checked(&self) -> bool {
        self.checked.unwrap_or(self.has_attr("checked"))
    }

    /// Text selection range of a text control, as set by the last edit.
    #[inline]
    #[must_use]
    pub fn selection(&self) -> Option<(u32, u32)> {
        self.selection
    }

    /// Scroll offsets `(x, y)` of the element's scroll box.
    #[inline]
    #[must_use]
    pub fn scroll(&self) -> (f64, f64) {
        self.scroll
    }

    /// Files attached to a file input.
    #[inline]
    #[must_use]
    pub fn files(&self) -> &[AttachedFile] {
        &self.files
    }
}

// ============================================================================
// NodeKind
// ============================================================================

/// Payload of one arena node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// ============================================================================
// Document
// ============================================================================

/// Arena-backed HTML document.
///
/// Parsed from server-rendered HTML, mutated in place by the patcher and by
/// synthetic user input, and serialized back to HTML for inspection.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    focused: Option<NodeId>,
    has_doctype: bool,
    auto_ids: u32,
}

impl Document {
    /// Parses a full HTML document.
    ///
    /// Parsing never fails: the HTML5 algorithm recovers from any input and
    /// always produces an `<html>` element with `<head>` and `<body>`.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            focused: None,
            has_doctype: false,
            auto_ids: 0,
        };
        let mut root = None;
        for child in parsed.tree.root().children() {
            match child.value() {
                HtmlNode::Doctype(_) => doc.has_doctype = true,
                HtmlNode::Element(_) => {
                    if let Some(id) = doc.convert(child) {
                        root.get_or_insert(id);
                    }
                }
                _ => {}
            }
        }
        doc.root = match root {
            Some(id) => id,
            None => doc.create_element(ElementData::new("html")),
        };
        doc
    }

    /// A minimal `<html><head></head><body></body></html>` document.
    #[must_use]
    pub fn empty() -> Self {
        Self::parse("<!DOCTYPE html><html><head></head><body></body></html>")
    }

    fn convert(&mut self, node: NodeRef<'_, HtmlNode>) -> Option<NodeId> {
        let kind = match node.value() {
            HtmlNode::Element(el) => {
                let mut data = ElementData::new(el.name());
                for (name, value) in el.attrs() {
                    data.set_attr(name, value);
                }
                NodeKind::Element(data)
            }
            HtmlNode::Text(text) => NodeKind::Text(text.text.to_string()),
            HtmlNode::Comment(comment) => NodeKind::Comment(comment.comment.to_string()),
            _ => return None,
        };
        let id = self.push(kind);
        for child in node.children() {
            if let Some(child_id) = self.convert(child) {
                self.attach(id, child_id);
            }
        }
        Some(id)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// The `<html>` element.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// True while the node is still part of the arena.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(Option::is_some)
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub(crate) fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.node_mut(id).map(|node| &mut node.kind)
    }

    /// The node's element data, if it is an element.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.kind_mut(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    #[must_use]
    pub fn head(&self) -> Option<NodeId> {
        self.root_child("head")
    }

    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        self.root_child("body")
    }

    fn root_child(&self, tag: &str) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&id| self.element(id).is_some_and(|el| el.tag() == tag))
    }

    /// Pre-order traversal of `id` and everything below it.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            out.push(current);
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Returns `id` followed by each ancestor up to the root.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if !self.contains(node_id) {
                break;
            }
            out.push(node_id);
            current = self.parent(node_id);
        }
        out
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node_id in self.subtree(id) {
            if let Some(NodeKind::Text(text)) = self.kind(node_id) {
                out.push_str(text);
            }
        }
        out
    }

    /// Text of the `<title>` element, if the document has one.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let id = self
            .subtree(self.root)
            .into_iter()
            .find(|&n| self.element(n).is_some_and(|el| el.tag() == "title"))?;
        Some(self.text_content(id))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, data: ElementData) -> NodeId {
        self.push(NodeKind::Element(data))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Appends `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        self.attach(parent, child);
    }

    /// Removes `id` from its parent's child list without freeing it.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&child| child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
    }

    /// Replaces `parent`'s child list, fixing up parent pointers.
    ///
    /// Former children absent from the new list are left detached in the
    /// arena; callers that want them gone must remove them explicitly.
    pub(crate) fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            if let Some(node) = self.node_mut(child) {
                node.parent = Some(parent);
            }
        }
        if let Some(node) = self.node_mut(parent) {
            node.children = children;
        }
    }

    /// Detaches `id` and tombstones its whole subtree.
    ///
    /// Clears focus if the focused node was inside the removed subtree.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        for node_id in self.subtree(id) {
            if self.focused == Some(node_id) {
                self.focused = None;
            }
            if let Some(slot) = self.nodes.get_mut(node_id.index()) {
                *slot = None;
            }
        }
    }

    /// Deep-copies a subtree from another document into this arena.
    ///
    /// The copy carries attributes only; live form state starts fresh.
    pub(crate) fn import_subtree(&mut self, source: &Document, id: NodeId) -> Option<NodeId> {
        let kind = source.kind(id)?.clone();
        let new_id = self.push(kind);
        for &child in source.children(id) {
            if let Some(imported) = self.import_subtree(source, child) {
                self.attach(new_id, imported);
            }
        }
        Some(new_id)
    }

    // ------------------------------------------------------------------
    // Form controls
    // ------------------------------------------------------------------

    /// Effective value of a form control.
    ///
    /// Live value if the control was typed into, else the `value` attribute
    /// (for a textarea, its text; for a select, the selected option).
    /// `None` for anything that is not a form control.
    #[must_use]
    pub fn control_value(&self, id: NodeId) -> Option<String> {
        let el = self.element(id)?;
        match el.tag() {
            "input" => Some(
                el.value
                    .clone()
                    .or_else(|| el.attr("value").map(str::to_string))
                    .unwrap_or_default(),
            ),
            "textarea" => Some(
                el.value
                    .clone()
                    .unwrap_or_else(|| self.text_content(id)),
            ),
            "select" => Some(self.select_current(id)),
            _ => None,
        }
    }

    fn select_current(&self, id: NodeId) -> String {
        if let Some(value) = self.element(id).and_then(|el| el.value.clone()) {
            return value;
        }
        let mut first = None;
        for opt in self.subtree(id) {
            let Some(el) = self.element(opt) else { continue };
            if el.tag() != "option" {
                continue;
            }
            let value = self.option_value(opt);
            if el.has_attr("selected") {
                return value;
            }
            if first.is_none() {
                first = Some(value);
            }
        }
        first.unwrap_or_default()
    }

    fn option_value(&self, id: NodeId) -> String {
        match self.element(id).and_then(|el| el.attr("value")) {
            Some(value) => value.to_string(),
            None => self.text_content(id),
        }
    }

    /// Values of every `<option>` under a select, in document order.
    pub(crate) fn option_values(&self, id: NodeId) -> Vec<String> {
        self.subtree(id)
            .into_iter()
            .filter(|&n| self.element(n).is_some_and(|el| el.tag() == "option"))
            .map(|n| self.option_value(n))
            .collect()
    }

    /// Sets the live value of a text control.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) -> Result<()> {
        let Some(el) = self.element(id) else {
            return Err(Error::patch(format!("node {id} is not an element")));
        };
        if !el.is_text_entry() {
            return Err(Error::patch(format!(
                "<{}> does not accept a text value",
                el.tag()
            )));
        }
        let value = value.into();
        let len = value.chars().count() as u32;
        if let Some(el) = self.element_mut(id) {
            if let Some((start, end)) = el.selection {
                el.selection = Some((start.min(len), end.min(len)));
            }
            el.value = Some(value);
        }
        Ok(())
    }

    /// Sets the live checked state of a checkbox or radio input.
    ///
    /// Checking a radio unchecks every other radio with the same `name`.
    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> Result<()> {
        let (is_radio, group) = {
            let Some(el) = self.element(id) else {
                return Err(Error::patch(format!("node {id} is not an element")));
            };
            if !el.is_checkable() {
                return Err(Error::patch(format!("<{}> is not checkable", el.tag())));
            }
            (el.input_type() == "radio", el.attr("name").map(str::to_string))
        };
        if is_radio && checked {
            if let Some(name) = group {
                for other in self.subtree(self.root) {
                    if other == id {
                        continue;
                    }
                    let Some(el) = self.element_mut(other) else { continue };
                    if el.tag() == "input"
                        && el.input_type() == "radio"
                        && el.attr("name") == Some(name.as_str())
                    {
                        el.checked = Some(false);
                    }
                }
            }
        }
        if let Some(el) = self.element_mut(id) {
            el.checked = Some(checked);
        }
        Ok(())
    }

    /// Selects the option with the given value.
    pub fn select_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        {
            let Some(el) = self.element(id) else {
                return Err(Error::patch(format!("node {id} is not an element")));
            };
            if el.tag() != "select" {
                return Err(Error::patch(format!("<{}> is not a select", el.tag())));
            }
        }
        if !self.option_values(id).iter().any(|v| v == value) {
            return Err(Error::patch(format!(
                "select {id} has no option with value {value:?}"
            )));
        }
        if let Some(el) = self.element_mut(id) {
            el.value = Some(value.to_string());
        }
        Ok(())
    }

    /// Sets the text selection range of a text control, clamped to its value.
    pub fn set_selection(&mut self, id: NodeId, start: u32, end: u32) -> Result<()> {
        let len = self
            .control_value(id)
            .map(|v| v.chars().count() as u32)
            .unwrap_or(0);
        let Some(el) = self.element_mut(id) else {
            return Err(Error::patch(format!("node {id} is not an element")));
        };
        if !el.is_text_entry() {
            return Err(Error::patch(format!(
                "<{}> has no text selection",
                el.tag()
            )));
        }
        el.selection = Some((start.min(len), end.min(len)));
        Ok(())
    }

    /// Records the scroll offsets of an element's scroll box.
    pub fn set_scroll(&mut self, id: NodeId, x: f64, y: f64) -> Result<()> {
        let Some(el) = self.element_mut(id) else {
            return Err(Error::patch(format!("node {id} is not an element")));
        };
        el.scroll = (x, y);
        Ok(())
    }

    /// Attaches a file to a file input.
    ///
    /// Inputs without the `multiple` attribute hold at most one file; a
    /// second attach replaces the first.
    pub fn attach_file(&mut self, id: NodeId, file: AttachedFile) -> Result<()> {
        let Some(el) = self.element_mut(id) else {
            return Err(Error::patch(format!("node {id} is not an element")));
        };
        if el.tag() != "input" || el.input_type() != "file" {
            return Err(Error::patch(format!(
                "<{} type=\"{}\"> is not a file input",
                el.tag(),
                el.input_type()
            )));
        }
        if !el.has_attr("multiple") {
            el.files.clear();
        }
        el.files.push(file);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    pub fn focus(&mut self, id: NodeId) -> Result<()> {
        if self.element(id).is_none() {
            return Err(Error::patch(format!("cannot focus {id}: not an element")));
        }
        self.focused = Some(id);
        Ok(())
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    #[inline]
    #[must_use]
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Returns the element's id attribute, assigning a generated one if it
    /// has none. Generated ids carry the [`AUTO_ID_PREFIX`] marker.
    pub(crate) fn ensure_element_id(&mut self, id: NodeId) -> Option<String> {
        if let Some(existing) = self.element(id)?.attr("id") {
            if !existing.is_empty() {
                return Some(existing.to_string());
            }
        }
        let generated = format!("{AUTO_ID_PREFIX}{}", self.auto_ids);
        self.auto_ids += 1;
        self.element_mut(id)?.set_attr("id", &generated);
        Some(generated)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// First element whose `id` attribute equals `value`.
    #[must_use]
    pub fn by_id(&self, value: &str) -> Option<NodeId> {
        self.subtree(self.root).into_iter().find(|&id| {
            self.element(id)
                .is_some_and(|el| el.attr("id") == Some(value))
        })
    }

    /// First element matching a compound selector, in document order.
    pub fn select_first(&self, selector: &str) -> Result<Option<NodeId>> {
        let parsed = SimpleSelector::parse(selector)?;
        Ok(self
            .subtree(self.root)
            .into_iter()
            .find(|&id| self.element(id).is_some_and(|el| parsed.matches(el))))
    }

    /// Every element matching a compound selector, in document order.
    pub fn select_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let parsed = SimpleSelector::parse(selector)?;
        Ok(self
            .subtree(self.root)
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|el| parsed.matches(el)))
            .collect())
    }

    /// Like [`select_first`](Self::select_first), but a missing element is
    /// an error.
    pub fn query(&self, selector: &str) -> Result<NodeId> {
        self.select_first(selector)?
            .ok_or_else(|| Error::node_not_found(selector))
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serializes the whole document back to HTML.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if self.has_doctype {
            out.push_str("<!DOCTYPE html>");
        }
        self.serialize_node(self.root, &mut out);
        out
    }

    /// Serializes one node and its subtree.
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_node(id, &mut out);
        out
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.element(p))
                    .is_some_and(|el| RAW_TEXT_ELEMENTS.contains(&el.tag()));
                if raw {
                    out.push_str(text);
                } else {
                    push_escaped_text(out, text);
                }
            }
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(el.tag());
                for (name, value) in el.attrs() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    push_escaped_attr(out, value);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag()) {
                    return;
                }
                for &child in &node.children {
                    self.serialize_node(child, out);
                }
                out.push_str("</");
                out.push_str(el.tag());
                out.push('>');
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// SimpleSelector
// ============================================================================

/// Compound selector of the form `tag#id.class[attr=value]`.
///
/// Combinators (whitespace, `>`, `+`, `~`, `,`) and pseudo-classes are not
/// supported; the runtime only ever needs to address a single element.
#[derive(Debug, Default)]
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl SimpleSelector {
    fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::selector("empty selector"));
        }
        let mut selector = Self::default();
        let mut chars = trimmed.chars().peekable();
        while let Some(&ch) = chars.peek() {
            match ch {
                '#' => {
                    chars.next();
                    selector.id = Some(read_name(&mut chars, trimmed)?);
                }
                '.' => {
                    chars.next();
                    selector.classes.push(read_name(&mut chars, trimmed)?);
                }
                '[' => {
                    chars.next();
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(c) => inner.push(c),
                            None => {
                                return Err(Error::selector(format!(
                                    "unterminated attribute in {trimmed:?}"
                                )));
                            }
                        }
                    }
                    let (name, value) = match inner.split_once('=') {
                        Some((name, value)) => {
                            (name.trim().to_string(), Some(strip_quotes(value.trim())))
                        }
                        None => (inner.trim().to_string(), None),
                    };
                    if name.is_empty() {
                        return Err(Error::selector(format!(
                            "empty attribute name in {trimmed:?}"
                        )));
                    }
                    selector.attrs.push((name.to_ascii_lowercase(), value));
                }
                c if c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',') => {
                    return Err(Error::selector(format!(
                        "combinators are not supported: {trimmed:?}"
                    )));
                }
                _ => {
                    if selector.tag.is_some() {
                        return Err(Error::selector(format!(
                            "unexpected {ch:?} in {trimmed:?}"
                        )));
                    }
                    selector.tag = Some(read_name(&mut chars, trimmed)?.to_ascii_lowercase());
                }
            }
        }
        Ok(selector)
    }

    fn matches(&self, el: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if el.tag() != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        for class in &self.classes {
            if !el.classes().any(|c| c == class) {
                return false;
            }
        }
        for (name, expected) in &self.attrs {
            match (el.attr(name), expected) {
                (Some(actual), Some(expected)) if actual == expected => {}
                (Some(_), None) => {}
                _ => return false,
            }
        }
        true
    }
}

fn read_name(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    selector: &str,
) -> Result<String> {
    let mut name = String::new();
    while let Some(&ch) = chars.peek() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            name.push(ch);
            chars.next();
        } else {
            break;
        }
    }
    if name.is_empty() {
        return Err(Error::selector(format!("expected a name in {selector:?}")));
    }
    Ok(name)
}

fn strip_quotes(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Document {
        Document::parse(&format!(
            "<!DOCTYPE html><html><head><title>t</title></head><body>{body}</body></html>"
        ))
    }

    #[test]
    fn test_parse_builds_tree() {
        let doc = page("<div id=\"a\"><p>hello</p></div>");
        let root = doc.root();
        assert_eq!(doc.element(root).map(ElementData::tag), Some("html"));
        assert!(doc.head().is_some());
        let body = doc.body().expect("body");
        let div = doc.children(body)[0];
        assert_eq!(doc.element(div).and_then(|el| el.attr("id")), Some("a"));
        assert_eq!(doc.text_content(div), "hello");
        assert_eq!(doc.parent(div), Some(body));
    }

    #[test]
    fn test_parse_preserves_attributes_and_title() {
        let doc = page("<input type=\"email\" name=\"addr\" value=\"x@y.z\">");
        let input = doc.query("input").expect("input");
        let el = doc.element(input).expect("element");
        assert_eq!(el.input_type(), "email");
        assert_eq!(el.attr("name"), Some("addr"));
        assert_eq!(el.attr("VALUE"), Some("x@y.z"));
        assert_eq!(doc.title().as_deref(), Some("t"));
    }

    #[test]
    fn test_serialize_round_trip_is_stable() {
        let doc = page("<ul><li class=\"x\">one</li><li>two</li></ul>");
        let once = doc.serialize();
        let twice = Document::parse(&once).serialize();
        assert_eq!(once, twice);
        assert!(once.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_serialize_escapes_text_and_attributes() {
        let mut doc = page("");
        let body = doc.body().expect("body");
        let div = doc.create_element(ElementData::new("div").with_attr("title", "a \"b\" & c"));
        let text = doc.create_text("1 < 2 & 3 > 2");
        doc.append_child(div, text);
        doc.append_child(body, div);
        let html = doc.outer_html(div);
        assert_eq!(
            html,
            "<div title=\"a &quot;b&quot; &amp; c\">1 &lt; 2 &amp; 3 &gt; 2</div>"
        );
    }

    #[test]
    fn test_script_text_serializes_raw() {
        let doc = page("<script>if (a < b) { go(); }</script>");
        let html = doc.serialize();
        assert!(html.contains("if (a < b) { go(); }"), "{html}");
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let doc = page("<br><input type=\"text\">");
        let html = doc.serialize();
        assert!(!html.contains("</br>"));
        assert!(!html.contains("</input>"));
    }

    #[test]
    fn test_by_id_and_query() {
        let doc = page("<div id=\"outer\"><span id=\"inner\">x</span></div>");
        assert!(doc.by_id("inner").is_some());
        assert!(doc.by_id("missing").is_none());
        let err = doc.query("#missing").expect_err("missing element");
        assert!(matches!(err, Error::NodeNotFound { .. }));
    }

    #[test]
    fn test_compound_selectors() {
        let doc = page(
            "<input class=\"wide dark\" name=\"q\" type=\"search\">\
             <input name=\"other\" type=\"text\">",
        );
        let hit = doc
            .select_first("input.wide[name=q]")
            .expect("parse")
            .expect("match");
        assert_eq!(
            doc.element(hit).and_then(|el| el.attr("type")),
            Some("search")
        );
        assert_eq!(doc.select_all("input").expect("parse").len(), 2);
        assert!(doc.select_first("[name=\"other\"]").expect("parse").is_some());

        let err = doc.select_first("div p").expect_err("combinator");
        assert!(matches!(err, Error::Selector { .. }));
    }

    #[test]
    fn test_control_value_sources() {
        let mut doc = page(
            "<input id=\"i\" value=\"attr\">\
             <textarea id=\"t\">body text</textarea>\
             <select id=\"s\"><option value=\"a\">A</option>\
             <option value=\"b\" selected=\"\">B</option></select>",
        );
        let input = doc.by_id("i").expect("input");
        let textarea = doc.by_id("t").expect("textarea");
        let select = doc.by_id("s").expect("select");

        assert_eq!(doc.control_value(input).as_deref(), Some("attr"));
        assert_eq!(doc.control_value(textarea).as_deref(), Some("body text"));
        assert_eq!(doc.control_value(select).as_deref(), Some("b"));

        doc.set_value(input, "typed").expect("set_value");
        assert_eq!(doc.control_value(input).as_deref(), Some("typed"));
        doc.select_value(select, "a").expect("select_value");
        assert_eq!(doc.control_value(select).as_deref(), Some("a"));
    }

    #[test]
    fn test_select_without_selected_attr_defaults_to_first_option() {
        let doc = page("<select id=\"s\"><option>x</option><option>y</option></select>");
        let select = doc.by_id("s").expect("select");
        assert_eq!(doc.control_value(select).as_deref(), Some("x"));
    }

    #[test]
    fn test_select_value_rejects_unknown_option() {
        let mut doc = page("<select id=\"s\"><option value=\"a\">A</option></select>");
        let select = doc.by_id("s").expect("select");
        let err = doc.select_value(select, "zzz").expect_err("unknown option");
        assert!(matches!(err, Error::Patch { .. }));
    }

    #[test]
    fn test_radio_group_unchecks_siblings() {
        let mut doc = page(
            "<input id=\"r1\" type=\"radio\" name=\"color\" checked=\"\">\
             <input id=\"r2\" type=\"radio\" name=\"color\">\
             <input id=\"r3\" type=\"radio\" name=\"size\">",
        );
        let r1 = doc.by_id("r1").expect("r1");
        let r2 = doc.by_id("r2").expect("r2");
        let r3 = doc.by_id("r3").expect("r3");

        doc.set_checked(r2, true).expect("check r2");
        assert!(!doc.element(r1).expect("r1").effective_checked());
        assert!(doc.element(r2).expect("r2").effective_checked());
        // different group untouched
        assert_eq!(doc.element(r3).expect("r3").live_checked(), None);
    }

    #[test]
    fn test_set_value_rejects_non_text_controls() {
        let mut doc = page("<input id=\"c\" type=\"checkbox\"><div id=\"d\"></div>");
        let checkbox = doc.by_id("c").expect("checkbox");
        let div = doc.by_id("d").expect("div");
        assert!(doc.set_value(checkbox, "x").is_err());
        assert!(doc.set_value(div, "x").is_err());
    }

    #[test]
    fn test_attach_file_respects_multiple() {
        let mut doc = page(
            "<input id=\"one\" type=\"file\">\
             <input id=\"many\" type=\"file\" multiple=\"\">",
        );
        let one = doc.by_id("one").expect("one");
        let many = doc.by_id("many").expect("many");
        let file = |name: &str| AttachedFile::new(name, "text/plain", b"data".to_vec());

        doc.attach_file(one, file("a.txt")).expect("attach");
        doc.attach_file(one, file("b.txt")).expect("attach");
        assert_eq!(doc.element(one).expect("one").files().len(), 1);
        assert_eq!(doc.element(one).expect("one").files()[0].name, "b.txt");

        doc.attach_file(many, file("a.txt")).expect("attach");
        doc.attach_file(many, file("b.txt")).expect("attach");
        assert_eq!(doc.element(many).expect("many").files().len(), 2);

        let text = doc.query("#one").expect("input");
        doc.set_value(text, "nope").expect_err("file input takes no text");
    }

    #[test]
    fn test_ensure_element_id_assigns_and_preserves() {
        let mut doc = page("<div id=\"fixed\"></div><span></span><b></b>");
        let fixed = doc.by_id("fixed").expect("fixed");
        let span = doc.query("span").expect("span");
        let bold = doc.query("b").expect("b");

        assert_eq!(doc.ensure_element_id(fixed).as_deref(), Some("fixed"));
        assert_eq!(doc.ensure_element_id(span).as_deref(), Some("pw-auto-0"));
        assert_eq!(doc.ensure_element_id(bold).as_deref(), Some("pw-auto-1"));
        // stable on repeat
        assert_eq!(doc.ensure_element_id(span).as_deref(), Some("pw-auto-0"));
    }

    #[test]
    fn test_remove_subtree_clears_focus_and_tombstones() {
        let mut doc = page("<div id=\"a\"><input id=\"b\"></div>");
        let div = doc.by_id("a").expect("div");
        let input = doc.by_id("b").expect("input");
        doc.focus(input).expect("focus");

        doc.remove_subtree(div);
        assert!(!doc.contains(div));
        assert!(!doc.contains(input));
        assert_eq!(doc.focused(), None);
        let body = doc.body().expect("body");
        assert!(doc.children(body).is_empty());
    }

    #[test]
    fn test_ancestors_runs_target_to_root() {
        let doc = page("<div><p><b id=\"deep\">x</b></p></div>");
        let deep = doc.by_id("deep").expect("deep");
        let chain = doc.ancestors(deep);
        assert_eq!(chain[0], deep);
        assert_eq!(*chain.last().expect("root"), doc.root());
        assert_eq!(chain.len(), 5); // b, p, div, body, html
    }

    #[test]
    fn test_selection_clamped_to_value() {
        let mut doc = page("<input id=\"i\" value=\"hello\">");
        let input = doc.by_id("i").expect("input");
        doc.set_selection(input, 2, 99).expect("set_selection");
        assert_eq!(doc.element(input).expect("el").selection(), Some((2, 5)));
        doc.set_value(input, "hi").expect("set_value");
        assert_eq!(doc.element(input).expect("el").selection(), Some((2, 2)));
    }
}
