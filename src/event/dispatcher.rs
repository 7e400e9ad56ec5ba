//! Event dispatch.
//!
//! One entry point, [`EventDispatcher::dispatch`], handles every supported
//! event type. Dispatch runs in three phases:
//!
//! 1. **Collect** (document read lock): drop suppressed types while a patch
//!    is in flight, walk the propagation path from the target outward
//!    gathering local bindings, then scan the whole document for
//!    `window`/`outside` scoped bindings. The gate stages run here, in
//!    fixed order per entry: prevent-default (always applied to submit) →
//!    stop-propagation → `self` → system keys → key filters. Stopping
//!    propagation finishes the declaring element's entries, then ends the
//!    walk; the document scan is independent of it.
//! 2. **Identify** (document write lock, only when needed): elements whose
//!    surviving entries carry a timing modifier get a generated id so their
//!    timer keys stay stable across patches.
//! 3. **Fire**: plain entries dispatch immediately; throttled entries check
//!    their window; debounced entries wait out the quiet period on a
//!    spawned task and dispatch only if still current.
//!
//! The payload is captured at collect time, so a debounced dispatch carries
//! the state of the burst's last event, not whatever the document looks
//! like when the timer fires.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dom::node::{AttachedFile, Document, NodeId};
use crate::dom::updater::UpdatingView;
use crate::event::EventType;
use crate::event::binding::{Binding, bindings_for};
use crate::event::keys::{Key, legacy_key_code};
use crate::event::modifiers::Scope;
use crate::event::timing::TimingState;
use crate::protocol::EventData;

// ============================================================================
// KeyPress
// ============================================================================

/// The keyboard payload of a synthetic `keydown`/`keyup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// DOM `key` value (`"Enter"`, `"a"`, ...).
    pub key: String,
    /// Physical `code` (`"KeyA"`), when known.
    pub code: Option<String>,
    /// Legacy `keyCode`; derived from `key` when absent.
    pub key_code: Option<u32>,
}

impl KeyPress {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: None,
            key_code: None,
        }
    }

    /// A printable character key.
    #[must_use]
    pub fn character(ch: char) -> Self {
        Self::new(ch.to_string())
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl From<Key> for KeyPress {
    fn from(key: Key) -> Self {
        let (name, code, key_code, _) = key.properties();
        Self {
            key: name.to_string(),
            code: Some(code.to_string()),
            key_code: Some(key_code),
        }
    }
}

// ============================================================================
// SyntheticEvent
// ============================================================================

/// One user interaction aimed at a document node.
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    pub event_type: EventType,
    pub target: NodeId,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    /// Present for keyboard events.
    pub key: Option<KeyPress>,
}

impl SyntheticEvent {
    #[must_use]
    pub fn new(event_type: EventType, target: NodeId) -> Self {
        Self {
            event_type,
            target,
            shift: false,
            ctrl: false,
            alt: false,
            meta: false,
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<KeyPress>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    #[must_use]
    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    #[must_use]
    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    #[must_use]
    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

// ============================================================================
// DispatchedEvent
// ============================================================================

/// A handler invocation on its way to the server.
#[derive(Debug, Clone)]
pub struct DispatchedEvent {
    /// Server-side handler name.
    pub handler: String,
    /// The wire payload.
    pub data: EventData,
    /// Files from the submitting form, paired with their field names. The
    /// shell uploads these before sending the event.
    pub files: Vec<(String, AttachedFile)>,
}

/// What a dispatch call did synchronously.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// A prevent-default stage ran (always true for handled submits).
    pub prevented: bool,
    /// Propagation was stopped before reaching the document root.
    pub stopped: bool,
    /// Entries that passed every gate (fired now or pending a timer).
    pub handled: usize,
}

// ============================================================================
// EventDispatcher
// ============================================================================

pub(crate) struct DispatcherInner {
    document: Arc<RwLock<Document>>,
    updating: UpdatingView,
    timing: TimingState,
    sink: mpsc::UnboundedSender<DispatchedEvent>,
}

impl DispatcherInner {
    fn send(&self, event: DispatchedEvent) {
        if self.sink.send(event).is_err() {
            debug!("Event sink closed. Dropping dispatched event");
        }
    }
}

/// Routes synthetic events through bindings, modifiers, and timers.
///
/// Cheap to clone; all clones share timing state and the outbound sink.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<DispatcherInner>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("updating", &self.inner.updating.is_updating())
            .finish_non_exhaustive()
    }
}

/// One binding that survived the gate stages.
struct FiringEntry {
    element: NodeId,
    element_id: Option<String>,
    handler: String,
    args: Map<String, Value>,
    debounce: Option<Duration>,
    throttle: Option<Duration>,
}

/// Target state captured at collect time, shared by every entry.
#[derive(Default)]
struct PayloadBasis {
    value: Option<String>,
    checked: Option<bool>,
    key: Option<String>,
    key_code: Option<u32>,
    form_data: Option<BTreeMap<String, String>>,
    files: Vec<(String, AttachedFile)>,
}

impl EventDispatcher {
    /// Creates a dispatcher over the shared document; the returned receiver
    /// yields every dispatched event for the shell to transmit.
    #[must_use]
    pub fn new(
        document: Arc<RwLock<Document>>,
        updating: UpdatingView,
    ) -> (Self, mpsc::UnboundedReceiver<DispatchedEvent>) {
        let (sink, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            inner: Arc::new(DispatcherInner {
                document,
                updating,
                timing: TimingState::default(),
                sink,
            }),
        };
        (dispatcher, rx)
    }

    /// Dispatches one event through the full pipeline.
    ///
    /// Debounced entries fire later from a spawned task; everything else is
    /// delivered before this returns. Must be called from within a Tokio
    /// runtime when timed modifiers are in play.
    pub fn dispatch(&self, event: &SyntheticEvent) -> DispatchReport {
        if event.event_type.suppressed_while_updating() && self.inner.updating.is_updating() {
            debug!(
                event_type = %event.event_type,
                "Suppressing event while a patch is applied"
            );
            return DispatchReport::default();
        }

        let (mut report, mut entries, basis) = self.collect(event);
        if entries.is_empty() {
            return report;
        }

        self.assign_timer_ids(&mut entries);

        for entry in entries {
            report.handled += 1;
            let message = DispatchedEvent {
                handler: entry.handler.clone(),
                data: build_payload(event, &entry, &basis),
                files: basis.files.clone(),
            };
            debug!(
                handler = %entry.handler,
                event_type = %event.event_type,
                "Dispatching event"
            );

            let key = TimingState::key(
                entry.element_id.as_deref().unwrap_or(""),
                event.event_type.as_str(),
                &entry.handler,
            );
            match (entry.debounce, entry.throttle) {
                (Some(quiet), throttle) => {
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move {
                        if !inner.timing.debounce(&key, quiet).await {
                            return;
                        }
                        if let Some(window) = throttle {
                            if !inner.timing.throttle(&key, window) {
                                return;
                            }
                        }
                        inner.send(message);
                    });
                }
                (None, Some(window)) => {
                    if self.inner.timing.throttle(&key, window) {
                        self.inner.send(message);
                    }
                }
                (None, None) => self.inner.send(message),
            }
        }
        report
    }

    /// Phase 1: gather surviving entries and the payload basis under the
    /// document read lock.
    fn collect(
        &self,
        event: &SyntheticEvent,
    ) -> (DispatchReport, Vec<FiringEntry>, PayloadBasis) {
        let mut report = DispatchReport::default();
        let mut entries = Vec::new();

        let doc = self.inner.document.read();
        if !doc.contains(event.target) {
            warn!(target = %event.target, "Event target is no longer in the document");
            return (report, entries, PayloadBasis::default());
        }

        let path = doc.ancestors(event.target);

        // propagation walk, target outward
        'walk: for &element in &path {
            let Some(el) = doc.element(element) else { continue };
            let mut stop_here = false;
            for binding in bindings_for(el, event.event_type) {
                if binding.modifiers.scope != Scope::Local {
                    continue;
                }
                let outcome = gate(&binding, element, event);
                report.prevented |= outcome.prevented;
                if outcome.stopped {
                    report.stopped = true;
                    stop_here = true;
                }
                if outcome.passes {
                    entries.push(entry_for(&doc, element, binding));
                }
            }
            if stop_here {
                break 'walk;
            }
        }

        // window/outside declarations, independent of propagation; a stop
        // modifier here has no walk left to cut short
        for node in doc.subtree(doc.root()) {
            let Some(el) = doc.element(node) else { continue };
            for binding in bindings_for(el, event.event_type) {
                match binding.modifiers.scope {
                    Scope::Local => continue,
                    Scope::Window => {}
                    Scope::Outside => {
                        if path.contains(&node) {
                            continue;
                        }
                    }
                }
                let outcome = gate(&binding, node, event);
                report.prevented |= outcome.prevented;
                if outcome.passes {
                    entries.push(entry_for(&doc, node, binding));
                }
            }
        }

        let basis = capture_basis(&doc, event, &path);
        (report, entries, basis)
    }

    /// Phase 2: generate ids for timer-carrying entries on id-less elements.
    fn assign_timer_ids(&self, entries: &mut [FiringEntry]) {
        let needs_id = entries
            .iter()
            .any(|e| (e.debounce.is_some() || e.throttle.is_some()) && e.element_id.is_none());
        if !needs_id {
            return;
        }
        let mut doc = self.inner.document.write();
        for entry in entries.iter_mut() {
            if (entry.debounce.is_some() || entry.throttle.is_some())
                && entry.element_id.is_none()
            {
                entry.element_id = doc.ensure_element_id(entry.element);
            }
        }
    }
}

/// The result of the gate stages for one binding.
struct GateOutcome {
    prevented: bool,
    stopped: bool,
    passes: bool,
}

/// Runs the gate stages for one binding, in pipeline order. Prevent and
/// stop take effect even when a later stage filters the entry out.
fn gate(binding: &Binding, element: NodeId, event: &SyntheticEvent) -> GateOutcome {
    let m = &binding.modifiers;
    let mut outcome = GateOutcome {
        // submit is always prevented
        prevented: m.prevent || event.event_type == EventType::Submit,
        stopped: m.stop,
        passes: false,
    };

    // self
    if m.self_only && element != event.target {
        return outcome;
    }
    // required system keys
    if (m.shift && !event.shift)
        || (m.ctrl && !event.ctrl)
        || (m.alt && !event.alt)
        || (m.meta && !event.meta)
    {
        return outcome;
    }
    // key filters
    if !m.keys.is_empty() {
        let Some(press) = event.key.as_ref() else {
            return outcome;
        };
        if !m
            .keys
            .iter()
            .any(|filter| filter.matches(&press.key, press.code.as_deref()))
        {
            return outcome;
        }
    }
    outcome.passes = true;
    outcome
}

fn entry_for(doc: &Document, element: NodeId, binding: Binding) -> FiringEntry {
    let element_id = doc
        .element(element)
        .and_then(|el| el.attr("id"))
        .filter(|id| !id.is_empty())
        .map(str::to_string);
    FiringEntry {
        element,
        element_id,
        handler: binding.handler,
        args: binding.args,
        debounce: binding.modifiers.debounce,
        throttle: binding.modifiers.throttle,
    }
}

/// Captures the target's state once per dispatch.
fn capture_basis(doc: &Document, event: &SyntheticEvent, path: &[NodeId]) -> PayloadBasis {
    let mut basis = PayloadBasis {
        value: doc.control_value(event.target),
        checked: doc
            .element(event.target)
            .filter(|el| el.is_checkable())
            .map(|el| el.effective_checked()),
        ..PayloadBasis::default()
    };
    if let Some(press) = &event.key {
        basis.key_code = press.key_code.or_else(|| legacy_key_code(&press.key));
        basis.key = Some(press.key.clone());
    }
    if event.event_type == EventType::Submit {
        let form = path
            .iter()
            .copied()
            .find(|&id| doc.element(id).is_some_and(|el| el.tag() == "form"));
        let (data, files) = match form {
            Some(form) => collect_form(doc, form),
            None => (BTreeMap::new(), Vec::new()),
        };
        basis.form_data = Some(data);
        basis.files = files;
    }
    basis
}

/// Flat form serialization, HTML submission rules: named, enabled controls
/// only; unchecked boxes are absent; file fields go to the upload list
/// instead of the map.
fn collect_form(
    doc: &Document,
    form: NodeId,
) -> (BTreeMap<String, String>, Vec<(String, AttachedFile)>) {
    let mut data = BTreeMap::new();
    let mut files = Vec::new();
    for id in doc.subtree(form) {
        let Some(el) = doc.element(id) else { continue };
        if !el.is_form_control() {
            continue;
        }
        let Some(name) = el.attr("name") else { continue };
        if name.is_empty() || el.has_attr("disabled") {
            continue;
        }
        if el.tag() == "input" && el.input_type() == "file" {
            for file in el.files() {
                files.push((name.to_string(), file.clone()));
            }
            continue;
        }
        if el.is_checkable() {
            if el.effective_checked() {
                data.insert(name.to_string(), el.attr("value").unwrap_or("on").to_string());
            }
            continue;
        }
        if let Some(value) = doc.control_value(id) {
            data.insert(name.to_string(), value);
        }
    }
    (data, files)
}

fn build_payload(event: &SyntheticEvent, entry: &FiringEntry, basis: &PayloadBasis) -> EventData {
    let mut data = EventData::new(event.event_type.as_str());
    data.id = entry.element_id.clone();
    data.value = basis.value.clone();
    data.checked = basis.checked;
    data.key = basis.key.clone();
    data.key_code = basis.key_code;
    data.form_data = basis.form_data.clone();
    data.args = entry.args.clone();
    data
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::updater::UpdatingFlag;
    use serde_json::json;
    use tokio::time::advance;

    fn setup(
        body: &str,
    ) -> (
        EventDispatcher,
        mpsc::UnboundedReceiver<DispatchedEvent>,
        Arc<RwLock<Document>>,
        UpdatingFlag,
    ) {
        let document = Arc::new(RwLock::new(Document::parse(&format!(
            "<html><head></head><body>{body}</body></html>"
        ))));
        let flag = UpdatingFlag::default();
        let (dispatcher, rx) = EventDispatcher::new(Arc::clone(&document), flag.view());
        (dispatcher, rx, document, flag)
    }

    fn target(document: &Arc<RwLock<Document>>, selector: &str) -> NodeId {
        document.read().query(selector).expect("target element")
    }

    #[tokio::test]
    async fn test_click_dispatches_handler_with_element_id() {
        let (dispatcher, mut rx, document, _flag) =
            setup("<button id=\"b\" data-on-click=\"save\">Go</button>");
        let button = target(&document, "#b");

        let report = dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, button));
        assert_eq!(report.handled, 1);
        assert!(!report.prevented);

        let event = rx.try_recv().expect("dispatched");
        assert_eq!(event.handler, "save");
        assert_eq!(event.data.event_type, "click");
        assert_eq!(event.data.id.as_deref(), Some("b"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_suppressed_types_drop_while_updating() {
        let (dispatcher, mut rx, document, flag) =
            setup("<div id=\"d\" data-on-focus=\"focused\" data-on-click=\"clicked\"></div>");
        let div = target(&document, "#d");
        flag.set();

        let report = dispatcher.dispatch(&SyntheticEvent::new(EventType::Focus, div));
        assert_eq!(report.handled, 0);
        assert!(rx.try_recv().is_err());

        // click is not in the suppressed set
        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, div));
        assert_eq!(rx.try_recv().expect("click").handler, "clicked");
    }

    #[tokio::test]
    async fn test_propagation_inner_first_then_stop() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<div id=\"outer\" data-on-click=\"outer\">\
             <div id=\"inner\" data-on-click=\"inner\" data-modifiers-click=\"stop\">\
             <span id=\"leaf\">x</span></div></div>",
        );
        let leaf = target(&document, "#leaf");

        let report = dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, leaf));
        assert!(report.stopped);
        assert_eq!(report.handled, 1);
        assert_eq!(rx.try_recv().expect("inner").handler, "inner");
        assert!(rx.try_recv().is_err(), "outer handler must not fire");
    }

    #[tokio::test]
    async fn test_self_modifier_requires_direct_target() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<div id=\"panel\" data-on-click=\"only_me\" data-modifiers-click=\"self\">\
             <span id=\"child\">x</span></div>",
        );

        let child = target(&document, "#child");
        let report = dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, child));
        assert_eq!(report.handled, 0);
        assert!(rx.try_recv().is_err());

        let panel = target(&document, "#panel");
        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, panel));
        assert_eq!(rx.try_recv().expect("direct").handler, "only_me");
    }

    #[tokio::test]
    async fn test_system_key_requirement() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<button id=\"b\" data-on-click=\"boost\" data-modifiers-click=\"ctrl\"></button>",
        );
        let button = target(&document, "#b");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, button));
        assert!(rx.try_recv().is_err(), "ctrl not held");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, button).ctrl());
        assert_eq!(rx.try_recv().expect("ctrl held").handler, "boost");
    }

    #[tokio::test]
    async fn test_enter_filter_gates_keydown() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<input id=\"i\" data-on-keydown=\"send\" data-modifiers-keydown=\"enter\">",
        );
        let input = target(&document, "#i");

        dispatcher.dispatch(
            &SyntheticEvent::new(EventType::KeyDown, input).with_key(KeyPress::character('a')),
        );
        assert!(rx.try_recv().is_err());

        dispatcher
            .dispatch(&SyntheticEvent::new(EventType::KeyDown, input).with_key(Key::Enter));
        let event = rx.try_recv().expect("enter");
        assert_eq!(event.handler, "send");
        assert_eq!(event.data.key.as_deref(), Some("Enter"));
        assert_eq!(event.data.key_code, Some(13));
    }

    #[tokio::test]
    async fn test_char_filter_uses_physical_code_fallback() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<input id=\"i\" data-on-keydown=\"mark\" data-modifiers-keydown=\"a\">",
        );
        let input = target(&document, "#i");

        // layout-shifted: logical key differs, physical code matches
        dispatcher.dispatch(
            &SyntheticEvent::new(EventType::KeyDown, input)
                .with_key(KeyPress::new("\u{0444}").with_code("KeyA")),
        );
        assert_eq!(rx.try_recv().expect("code fallback").handler, "mark");
    }

    #[tokio::test]
    async fn test_input_payload_carries_live_value() {
        let (dispatcher, mut rx, document, _flag) =
            setup("<input id=\"i\" data-on-input=\"search\" value=\"seed\">");
        let input = target(&document, "#i");
        document.write().set_value(input, "typed").expect("set_value");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Input, input));
        let event = rx.try_recv().expect("input");
        assert_eq!(event.data.value.as_deref(), Some("typed"));
        assert_eq!(event.data.checked, None);
    }

    #[tokio::test]
    async fn test_submit_collects_form_data_and_is_always_prevented() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<form id=\"f\" data-on-submit=\"create\">\
             <input name=\"title\" value=\"hello\">\
             <input name=\"tick\" type=\"checkbox\" checked=\"\">\
             <input name=\"off\" type=\"checkbox\">\
             <input name=\"doc\" type=\"file\">\
             <input name=\"hidden\" disabled=\"\" value=\"x\">\
             <button name=\"ignored\">go</button></form>",
        );
        let form = target(&document, "#f");
        {
            let mut doc = document.write();
            let file_input = doc.query("[name=doc]").expect("file input");
            doc.attach_file(
                file_input,
                AttachedFile::new("a.txt", "text/plain", b"hi".to_vec()),
            )
            .expect("attach");
        }

        let report = dispatcher.dispatch(&SyntheticEvent::new(EventType::Submit, form));
        assert!(report.prevented, "submit is always prevented");

        let event = rx.try_recv().expect("submit");
        let form_data = event.data.form_data.expect("form data");
        assert_eq!(form_data.get("title").map(String::as_str), Some("hello"));
        assert_eq!(form_data.get("tick").map(String::as_str), Some("on"));
        assert!(!form_data.contains_key("off"), "unchecked box is absent");
        assert!(!form_data.contains_key("doc"), "file fields never flatten");
        assert!(!form_data.contains_key("hidden"), "disabled is skipped");
        assert_eq!(event.files.len(), 1);
        assert_eq!(event.files[0].0, "doc");
        assert_eq!(event.files[0].1.name, "a.txt");
    }

    #[tokio::test]
    async fn test_window_scope_fires_for_any_target() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<div id=\"watcher\" data-on-scroll=\"track\" data-modifiers-scroll=\"window\"></div>\
             <p id=\"far\">away</p>",
        );
        let far = target(&document, "#far");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Scroll, far));
        assert_eq!(rx.try_recv().expect("window handler").handler, "track");
    }

    #[tokio::test]
    async fn test_outside_scope_fires_only_outside_the_subtree() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<div id=\"menu\" data-on-click=\"close\" data-modifiers-click=\"outside\">\
             <span id=\"item\">x</span></div><p id=\"elsewhere\">y</p>",
        );

        let item = target(&document, "#item");
        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, item));
        assert!(rx.try_recv().is_err(), "inside the subtree");

        let elsewhere = target(&document, "#elsewhere");
        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, elsewhere));
        assert_eq!(rx.try_recv().expect("outside").handler, "close");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_burst_dispatches_once_with_last_value() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<input data-on-input=\"search\" data-modifiers-input=\"debounce-250ms\">",
        );
        let input = target(&document, "input");

        for text in ["h", "he", "hel"] {
            document.write().set_value(input, text).expect("set_value");
            dispatcher.dispatch(&SyntheticEvent::new(EventType::Input, input));
            advance(Duration::from_millis(50)).await;
        }
        assert!(rx.try_recv().is_err(), "still inside the quiet period");

        advance(Duration::from_millis(300)).await;
        let event = rx.try_recv().expect("debounced dispatch");
        assert_eq!(event.data.value.as_deref(), Some("hel"));
        assert!(rx.try_recv().is_err(), "burst coalesced to one dispatch");

        // the id generated for the timer key is on the element now
        let doc = document.read();
        let id = doc.element(input).and_then(|el| el.attr("id")).expect("id");
        assert!(id.starts_with("pw-auto-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_fires_immediately_then_blocks() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<div id=\"feed\" data-on-scroll=\"more\" data-modifiers-scroll=\"throttle-250ms\"></div>",
        );
        let feed = target(&document, "#feed");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Scroll, feed));
        assert_eq!(rx.try_recv().expect("leading edge").handler, "more");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Scroll, feed));
        assert!(rx.try_recv().is_err(), "inside the window");

        advance(Duration::from_millis(300)).await;
        dispatcher.dispatch(&SyntheticEvent::new(EventType::Scroll, feed));
        assert_eq!(rx.try_recv().expect("window reopened").handler, "more");
    }

    #[tokio::test]
    async fn test_json_binding_args_reach_the_payload() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<button id=\"b\" data-on-click='[{\"handler\":\"pick\",\"args\":[7,\"x\"]}]'></button>",
        );
        let button = target(&document, "#b");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, button));
        let event = rx.try_recv().expect("dispatch");
        assert_eq!(event.handler, "pick");
        assert_eq!(event.data.args.get("0"), Some(&json!(7)));
        assert_eq!(event.data.args.get("1"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_legacy_args_decode_with_raw_fallback() {
        let (dispatcher, mut rx, document, _flag) = setup(
            "<button id=\"b\" data-on-click=\"tag\" data-arg-count=\"3\" \
             data-arg-note=\"plain text\"></button>",
        );
        let button = target(&document, "#b");

        dispatcher.dispatch(&SyntheticEvent::new(EventType::Click, button));
        let event = rx.try_recv().expect("dispatch");
        assert_eq!(event.data.args.get("count"), Some(&json!(3)));
        assert_eq!(event.data.args.get("note"), Some(&json!("plain text")));
    }
}
