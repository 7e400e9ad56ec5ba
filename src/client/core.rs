//! Client facade and run loop.
//!
//! The [`Client`] owns one live page: the parsed [`Document`], the
//! transport that carries its traffic, the event dispatcher that turns
//! synthetic interactions into wire events, and the run loop that applies
//! server pushes.
//!
//! ```text
//!               open(path)
//!                   │
//!   Uninitialized ──► Connecting ──► Connected ◄──► Disconnected
//!                                        │
//!                                     close()
//!                                        ▼
//!                                      Closed
//! ```
//!
//! Two background tasks run per client: the **run loop** consumes server
//! messages (`update` → patch, `reload` → re-fetch, errors and console →
//! log), and the **event pump** forwards dispatched events upstream,
//! performing any pending file uploads first. Both stop on `close()`.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::dom::{AttachedFile, Document, DomUpdater, NodeId};
use crate::error::{Error, Result};
use crate::event::{
    DispatchReport, DispatchedEvent, EventDispatcher, EventType, KeyPress, SyntheticEvent,
};
use crate::identifiers::UploadId;
use crate::protocol::{ClientMessage, ConsoleLevel, Endpoints, Flavor, ServerMessage, StackFrame};
use crate::transport::{TransportKind, TransportManager};

use super::navigation::{History, NavigationMeta, NavigationSet};
use super::options::ClientOptions;
use super::upload::{MAX_UPLOAD_BYTES, Uploader};

// ============================================================================
// ClientState
// ============================================================================

/// Lifecycle state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Built, no page opened yet.
    Uninitialized,
    /// `open` is fetching the page and dialing a transport.
    Connecting,
    /// A transport is passing traffic.
    Connected,
    /// The page is loaded but no transport is passing traffic.
    Disconnected,
    /// Closed on purpose; terminal.
    Closed,
}

impl ClientState {
    /// Returns the lowercase state name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Uninitialized => "uninitialized",
            ClientState::Connecting => "connecting",
            ClientState::Connected => "connected",
            ClientState::Disconnected => "disconnected",
            ClientState::Closed => "closed",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NavigationOutcome
// ============================================================================

/// How a navigation was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The live session followed the path change over the transport.
    Relocated,
    /// The page was fetched over HTTP and replaced wholesale.
    FullLoad,
}

// ============================================================================
// PageMeta
// ============================================================================

/// Metadata embedded in a served page.
#[derive(Debug, Clone, Default)]
struct PageMeta {
    /// Compiled navigation set from the SPA metadata script.
    navigation: NavigationSet,
    /// Token for the upload endpoint.
    upload_token: Option<String>,
    /// Certificate pin injected by development servers.
    cert_hash: Option<[u8; 32]>,
}

/// Reads the flavor's metadata markers out of a parsed page.
fn extract_meta(doc: &Document, flavor: Flavor) -> PageMeta {
    let navigation = doc
        .by_id(flavor.meta_script_id())
        .map(|id| NavigationMeta::parse(&doc.text_content(id)))
        .map(|meta| NavigationSet::from_meta(&meta))
        .unwrap_or_default();

    let upload_token = doc
        .select_first(&format!("meta[name={}]", flavor.upload_token_meta()))
        .ok()
        .flatten()
        .and_then(|id| doc.element(id).and_then(|el| el.attr("content")))
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    let cert_hash = doc
        .select_all("script")
        .unwrap_or_default()
        .into_iter()
        .find_map(|id| parse_cert_hash(&doc.text_content(id), flavor.cert_hash_global()));

    PageMeta {
        navigation,
        upload_token,
        cert_hash,
    }
}

/// Parses `GLOBAL = [b0, b1, ...]` out of an inline script.
///
/// `None` unless the assignment is present and carries exactly 32 bytes.
fn parse_cert_hash(script: &str, global: &str) -> Option<[u8; 32]> {
    let after = &script[script.find(global)? + global.len()..];
    let open = after.find('[')?;
    if after[..open].trim() != "=" {
        return None;
    }
    let close = after[open..].find(']')? + open;

    let mut bytes = Vec::with_capacity(32);
    for part in after[open + 1..close].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        bytes.push(part.parse::<u8>().ok()?);
    }
    <[u8; 32]>::try_from(bytes).ok()
}

// ============================================================================
// ClientInner
// ============================================================================

/// Shared state behind the [`Client`] facade.
pub(crate) struct ClientInner {
    /// Endpoint catalogue for the origin.
    endpoints: Endpoints,
    /// Shared HTTP client for page fetches, capabilities, and uploads.
    http: reqwest::Client,
    /// Connection options.
    options: ClientOptions,
    /// The live document.
    document: Arc<RwLock<Document>>,
    /// Applies server snapshots to the document.
    updater: DomUpdater,
    /// Routes synthetic interactions through bindings and timers.
    dispatcher: EventDispatcher,
    /// Sends attached files ahead of their submit events.
    uploader: Uploader,
    /// Lifecycle state; shared with the transport status callback.
    state: Arc<Mutex<ClientState>>,
    /// Current page path.
    path: Mutex<String>,
    /// Metadata of the current page.
    meta: Mutex<PageMeta>,
    /// Headless session history.
    history: Mutex<History>,
    /// The transport manager, once `open` has built one.
    manager: Mutex<Option<TransportManager>>,
    /// Dispatcher output, consumed once by the event pump.
    events: Mutex<Option<mpsc::UnboundedReceiver<DispatchedEvent>>>,
    /// Background tasks aborted on `close`.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

// ============================================================================
// Client
// ============================================================================

/// Headless client for one live page.
///
/// Cheap to clone; clones share the document, transport, and state.
///
/// # Examples
///
/// ```no_run
/// use pywire_client::Client;
///
/// # async fn example() -> pywire_client::Result<()> {
/// let client = Client::builder()
///     .base_url("http://localhost:8000")
///     .build()?;
///
/// client.open("/counter").await?;
/// client.click("#increment")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("path", &self.path())
            .field("transport", &self.transport())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> super::builder::ClientBuilder {
        super::builder::ClientBuilder::new()
    }

    /// Creates a client for a validated base URL.
    pub(crate) fn new(base: Url, options: ClientOptions) -> Self {
        let endpoints = Endpoints::new(base, options.flavor);
        let http = reqwest::Client::new();
        let document = Arc::new(RwLock::new(Document::empty()));
        let updater = DomUpdater::new(Arc::clone(&document));
        let (dispatcher, events) =
            EventDispatcher::new(Arc::clone(&document), updater.updating_view());
        let uploader = Uploader::new(http.clone(), endpoints.clone());

        Self {
            inner: Arc::new(ClientInner {
                endpoints,
                http,
                options,
                document,
                updater,
                dispatcher,
                uploader,
                state: Arc::new(Mutex::new(ClientState::Uninitialized)),
                path: Mutex::new(String::from("/")),
                meta: Mutex::new(PageMeta::default()),
                history: Mutex::new(History::default()),
                manager: Mutex::new(None),
                events: Mutex::new(Some(events)),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Opens a page: fetches it over HTTP, reads its embedded metadata,
    /// and dials a transport.
    ///
    /// A transport failure does not fail `open`; the client stays usable
    /// in the `Disconnected` state and reports it through
    /// [`state`](Self::state).
    ///
    /// # Errors
    ///
    /// Returns an error when the client is closed or the page itself
    /// cannot be fetched and parsed.
    pub async fn open(&self, path: &str) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state == ClientState::Closed {
                return Err(Error::config("client is closed; build a new one"));
            }
            *state = ClientState::Connecting;
        }

        match self.open_inner(path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut state = self.inner.state.lock();
                if *state == ClientState::Connecting {
                    *state = ClientState::Uninitialized;
                }
                Err(e)
            }
        }
    }

    async fn open_inner(&self, path: &str) -> Result<()> {
        let html = self.fetch_page(path).await?;
        self.inner.updater.replace(&html);
        self.refresh_meta();

        *self.inner.path.lock() = path.to_string();
        self.inner.history.lock().record(path);

        // one manager per open; a repeat open replaces it
        if let Some(previous) = self.inner.manager.lock().take() {
            previous.close().await;
        }
        let cert_hash = self.inner.meta.lock().cert_hash;
        let manager = TransportManager::new(
            self.inner.http.clone(),
            self.inner.endpoints.clone(),
            path,
            self.inner.options.manager_config(cert_hash),
        );

        let state = Arc::clone(&self.inner.state);
        manager.on_status(Arc::new(move |status| {
            let mut state = state.lock();
            if *state == ClientState::Closed {
                return;
            }
            match status {
                s if s.is_connected() => *state = ClientState::Connected,
                crate::transport::TransportStatus::Disconnected => {
                    if *state == ClientState::Connected {
                        *state = ClientState::Disconnected;
                    }
                }
                other => debug!(status = ?other, "Transport status"),
            }
        }));

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        manager.on_message(Arc::new(move |message| {
            let _ = message_tx.send(message.clone());
        }));

        *self.inner.manager.lock() = Some(manager.clone());

        match manager.connect().await {
            Ok(kind) => {
                info!(transport = %kind, path, "Page opened");
                *self.inner.state.lock() = ClientState::Connected;
            }
            Err(e) => {
                warn!(error = %e, path, "No transport available. Client stays offline");
                *self.inner.state.lock() = ClientState::Disconnected;
            }
        }

        let run = {
            let client = self.clone();
            tokio::spawn(client.run_loop(message_rx))
        };
        let mut tasks = self.inner.tasks.lock();
        tasks.push(run);

        // the pump starts once and survives later opens
        if let Some(events) = self.inner.events.lock().take() {
            let client = self.clone();
            tasks.push(tokio::spawn(client.pump_events(events)));
        }

        Ok(())
    }

    /// Closes the client: stops both background tasks and the transport.
    ///
    /// Terminal; a closed client refuses `open`.
    pub async fn close(&self) {
        *self.inner.state.lock() = ClientState::Closed;

        let tasks: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }

        let manager = self.inner.manager.lock().take();
        if let Some(manager) = manager {
            manager.close().await;
        }
        info!("Client closed");
    }

    /// Fetches an application page over HTTP.
    async fn fetch_page(&self, path: &str) -> Result<String> {
        let url = self.inner.endpoints.page_url(path)?;
        let response = self.inner.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::connection(format!(
                "page fetch for {path} failed with status {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    /// Re-reads page metadata from the current document.
    fn refresh_meta(&self) {
        let meta = {
            let doc = self.inner.document.read();
            extract_meta(&doc, self.inner.endpoints.flavor())
        };
        debug!(
            patterns = meta.navigation.patterns().len(),
            has_upload_token = meta.upload_token.is_some(),
            has_cert_hash = meta.cert_hash.is_some(),
            "Page metadata read"
        );
        *self.inner.meta.lock() = meta;
    }
}

// ============================================================================
// Client - Run loop
// ============================================================================

impl Client {
    /// Consumes server messages until the channel closes.
    async fn run_loop(self, mut messages: mpsc::UnboundedReceiver<ServerMessage>) {
        while let Some(message) = messages.recv().await {
            self.handle_server_message(message).await;
        }
        debug!("Run loop finished");
    }

    /// Applies one server message.
    pub(crate) async fn handle_server_message(&self, message: ServerMessage) {
        match message {
            ServerMessage::Update { html } => {
                self.inner.updater.update(&html);
            }
            ServerMessage::Reload => {
                let path = self.inner.path.lock().clone();
                debug!(path, "Server requested a reload");
                match self.fetch_page(&path).await {
                    Ok(html) => {
                        self.inner.updater.replace(&html);
                        self.refresh_meta();
                    }
                    Err(e) => warn!(error = %e, path, "Reload fetch failed"),
                }
            }
            ServerMessage::Error { error } => {
                error!(error = %error, "Server reported an error");
            }
            ServerMessage::ErrorTrace { error, trace } => {
                error!(
                    error = %error,
                    trace = %format_trace(&trace),
                    "Server reported an error"
                );
            }
            ServerMessage::Console { level, lines } => {
                for line in &lines {
                    match level {
                        ConsoleLevel::Error => error!(console = %line, "Server console"),
                        ConsoleLevel::Warn => warn!(console = %line, "Server console"),
                        ConsoleLevel::Debug => debug!(console = %line, "Server console"),
                        ConsoleLevel::Log | ConsoleLevel::Info => {
                            info!(console = %line, "Server console");
                        }
                    }
                }
            }
            ServerMessage::Unknown { kind } => {
                warn!(kind, "Ignoring unknown server message");
            }
        }
    }

    /// Forwards dispatched events upstream until the dispatcher closes.
    async fn pump_events(self, mut events: mpsc::UnboundedReceiver<DispatchedEvent>) {
        while let Some(event) = events.recv().await {
            self.transmit(event).await;
        }
        debug!("Event pump finished");
    }

    /// Uploads any attachments, then sends one event message.
    ///
    /// Failures are logged and drop the event; nothing here tears the
    /// client down.
    async fn transmit(&self, event: DispatchedEvent) {
        let DispatchedEvent {
            handler,
            mut data,
            files,
        } = event;

        if !files.is_empty() {
            match self.upload_attachments(&files).await {
                Ok(ids) => {
                    let form = data.form_data.get_or_insert_with(BTreeMap::new);
                    for (field, id) in ids {
                        form.insert(field, id.into_inner());
                    }
                }
                Err(e) => {
                    error!(error = %e, handler, "Upload failed. Dropping event");
                    return;
                }
            }
        }

        let message = ClientMessage::Event {
            handler: handler.clone(),
            path: self.inner.path.lock().clone(),
            data,
        };
        let manager = self.inner.manager.lock().clone();
        let Some(manager) = manager else {
            warn!(handler, "No transport. Dropping event");
            return;
        };
        if let Err(e) = manager.send(&message).await {
            warn!(error = %e, handler, "Failed to send event");
        }
    }

    /// Uploads one submission's files using the page's token.
    async fn upload_attachments(
        &self,
        files: &[(String, AttachedFile)],
    ) -> Result<BTreeMap<String, UploadId>> {
        let token = self
            .inner
            .meta
            .lock()
            .upload_token
            .clone()
            .ok_or_else(|| Error::upload("page carries no upload token"))?;
        self.inner.uploader.upload(&token, files).await
    }
}

/// Formats server stack frames, outermost first.
fn format_trace(trace: &[StackFrame]) -> String {
    let mut out = String::new();
    for frame in trace {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("  at ");
        out.push_str(&frame.name);
        out.push_str(" (");
        out.push_str(&frame.filename);
        out.push(':');
        out.push_str(&frame.lineno.to_string());
        if let Some(colno) = frame.colno {
            out.push(':');
            out.push_str(&colno.to_string());
        }
        out.push(')');
        if !frame.line.is_empty() {
            out.push(' ');
            out.push_str(frame.line.trim());
        }
    }
    out
}

// ============================================================================
// Client - Navigation
// ============================================================================

impl Client {
    /// Navigates to an origin-relative path.
    ///
    /// Paths in the page's navigation set (or any path under
    /// `enable_pjax`) relocate over the live transport; anything else is
    /// a full page load. Both record history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] while no transport is connected.
    pub async fn navigate(&self, path: &str) -> Result<NavigationOutcome> {
        if self.state() != ClientState::Connected {
            return Err(Error::not_connected("navigate"));
        }

        if self.inner.meta.lock().navigation.matches(path) {
            self.relocate(path).await?;
            Ok(NavigationOutcome::Relocated)
        } else {
            self.full_load(path).await?;
            Ok(NavigationOutcome::FullLoad)
        }
    }

    /// Returns to the previous history entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Navigation`] when there is no earlier entry and
    /// [`Error::NotConnected`] while no transport is connected.
    pub async fn back(&self) -> Result<()> {
        if self.state() != ClientState::Connected {
            return Err(Error::not_connected("back"));
        }
        let previous = self
            .inner
            .history
            .lock()
            .back()
            .ok_or_else(|| Error::navigation("history has no earlier entry"))?;
        self.relocate(&previous).await
    }

    /// Clicks a link element, honoring handler interception.
    ///
    /// The click dispatches through the element's bindings first; a
    /// prevented default stops here with `None`. Otherwise the `href` is
    /// resolved against the origin and navigated like
    /// [`navigate`](Self::navigate).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Navigation`] for a missing `href` or a
    /// cross-origin target.
    pub async fn click_link(&self, selector: &str) -> Result<Option<NavigationOutcome>> {
        let (node, href) = {
            let doc = self.inner.document.read();
            let node = doc.query(selector)?;
            let href = doc
                .element(node)
                .and_then(|el| el.attr("href"))
                .map(str::to_string)
                .ok_or_else(|| Error::navigation(format!("element has no href: {selector}")))?;
            (node, href)
        };

        let report = self
            .inner
            .dispatcher
            .dispatch(&SyntheticEvent::new(EventType::Click, node));
        if report.prevented {
            debug!(selector, "Link click prevented by a handler");
            return Ok(None);
        }

        let path = self.resolve_same_origin(&href)?;
        self.navigate(&path).await.map(Some)
    }

    /// Relocates the live session to `path`.
    async fn relocate(&self, path: &str) -> Result<()> {
        let manager = self
            .inner
            .manager
            .lock()
            .clone()
            .ok_or_else(|| Error::not_connected("relocate"))?;
        manager.set_path(path);
        manager
            .send(&ClientMessage::Relocate {
                path: path.to_string(),
            })
            .await?;

        *self.inner.path.lock() = path.to_string();
        self.inner.history.lock().record(path);
        info!(path, "Relocated");
        Ok(())
    }

    /// Replaces the page wholesale from an HTTP fetch.
    async fn full_load(&self, path: &str) -> Result<()> {
        let html = self.fetch_page(path).await?;
        self.inner.updater.replace(&html);
        self.refresh_meta();

        if let Some(manager) = self.inner.manager.lock().clone() {
            manager.set_path(path);
        }
        *self.inner.path.lock() = path.to_string();
        self.inner.history.lock().record(path);
        info!(path, "Loaded page");
        Ok(())
    }

    /// Resolves a link `href` to an origin-relative path.
    fn resolve_same_origin(&self, href: &str) -> Result<String> {
        if href.starts_with('/') {
            return Ok(href.to_string());
        }
        match Url::parse(href) {
            Ok(absolute) => {
                if absolute.origin() != self.inner.endpoints.base().origin() {
                    return Err(Error::navigation(format!("cross-origin link: {href}")));
                }
                Ok(path_and_query(&absolute))
            }
            // relative href, resolve against the base
            Err(_) => Ok(path_and_query(&self.inner.endpoints.page_url(href)?)),
        }
    }
}

/// Extracts the path plus query string of a URL.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

// ============================================================================
// Client - Synthetic input
// ============================================================================

impl Client {
    /// Dispatches a raw synthetic event.
    pub fn dispatch(&self, event: &SyntheticEvent) -> DispatchReport {
        self.inner.dispatcher.dispatch(event)
    }

    /// Clicks the first element matching the selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when nothing matches.
    pub fn click(&self, selector: &str) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Click, node)))
    }

    /// Sets a text control's value and dispatches `input`.
    ///
    /// # Errors
    ///
    /// Returns an error when the selector misses or the element does not
    /// take text input.
    pub fn set_value(&self, selector: &str, value: impl Into<String>) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        self.inner.document.write().set_value(node, value)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Input, node)))
    }

    /// Presses a key on an element: `keydown` followed by `keyup`.
    pub fn press(&self, selector: &str, key: impl Into<KeyPress>) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        let key = key.into();

        let down = self.dispatch(&SyntheticEvent::new(EventType::KeyDown, node).with_key(key.clone()));
        let up = self.dispatch(&SyntheticEvent::new(EventType::KeyUp, node).with_key(key));
        Ok(DispatchReport {
            prevented: down.prevented || up.prevented,
            stopped: down.stopped || up.stopped,
            handled: down.handled + up.handled,
        })
    }

    /// Sets a checkbox or radio and dispatches `change`.
    pub fn set_checked(&self, selector: &str, checked: bool) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        self.inner.document.write().set_checked(node, checked)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Change, node)))
    }

    /// Selects an option by value and dispatches `change`.
    pub fn select(&self, selector: &str, value: &str) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        self.inner.document.write().select_value(node, value)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Change, node)))
    }

    /// Attaches a file to a file input and dispatches `change`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UploadTooLarge`] immediately for a file over the
    /// per-file limit; nothing is attached.
    pub fn attach_file(&self, selector: &str, file: AttachedFile) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;

        if file.bytes.len() > MAX_UPLOAD_BYTES {
            let field = {
                let doc = self.inner.document.read();
                doc.element(node)
                    .and_then(|el| el.attr("name"))
                    .unwrap_or(selector)
                    .to_string()
            };
            return Err(Error::upload_too_large(field, file.bytes.len(), MAX_UPLOAD_BYTES));
        }

        self.inner.document.write().attach_file(node, file)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Change, node)))
    }

    /// Submits a form element.
    ///
    /// Default is always prevented for handled submits; the form's data
    /// travels in the event payload and attached files are uploaded by
    /// the pump before the event is sent.
    pub fn submit(&self, selector: &str) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Submit, node)))
    }

    /// Focuses an element and dispatches `focus`.
    pub fn focus(&self, selector: &str) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        self.inner.document.write().focus(node)?;
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Focus, node)))
    }

    /// Clears focus and dispatches `blur` at the element.
    pub fn blur(&self, selector: &str) -> Result<DispatchReport> {
        let node = self.resolve(selector)?;
        self.inner.document.write().blur();
        Ok(self.dispatch(&SyntheticEvent::new(EventType::Blur, node)))
    }

    fn resolve(&self, selector: &str) -> Result<NodeId> {
        self.inner.document.read().query(selector)
    }
}

// ============================================================================
// Client - Inspection
// ============================================================================

impl Client {
    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.inner.state.lock()
    }

    /// Returns `true` while a transport is passing traffic.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// Returns the current page path.
    #[must_use]
    pub fn path(&self) -> String {
        self.inner.path.lock().clone()
    }

    /// Returns the framework flavor spoken at the origin.
    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.inner.endpoints.flavor()
    }

    /// Returns the kind of the connected transport, if any.
    #[must_use]
    pub fn transport(&self) -> Option<TransportKind> {
        self.inner.manager.lock().as_ref().and_then(TransportManager::active_kind)
    }

    /// Returns a handle to the live document.
    #[must_use]
    pub fn document(&self) -> Arc<RwLock<Document>> {
        Arc::clone(&self.inner.document)
    }

    /// Serializes the current document to HTML.
    #[must_use]
    pub fn html(&self) -> String {
        self.inner.document.read().serialize()
    }

    /// Returns the current page title.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.inner.document.read().title()
    }

    /// Returns the concatenated text of the first matching element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when nothing matches.
    pub fn text(&self, selector: &str) -> Result<String> {
        let doc = self.inner.document.read();
        let node = doc.query(selector)?;
        Ok(doc.text_content(node))
    }

    /// Returns the effective value of the first matching form control.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when nothing matches.
    pub fn value(&self, selector: &str) -> Result<Option<String>> {
        let doc = self.inner.document.read();
        let node = doc.query(selector)?;
        Ok(doc.control_value(node))
    }
}

// ============================================================================
// Tests
// ============================================================================
