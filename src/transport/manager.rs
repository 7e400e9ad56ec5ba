//! Transport selection and fallback.
//!
//! The manager owns the answer to "how do we talk to this server". It
//! fetches the server's advertised capabilities, filters the configured
//! preference order down to feasible candidates, then walks that list
//! dialing each in turn until one connects:
//!
//! ```text
//! capabilities ──► candidate_order ──► try stream ──► try socket ──► try polling
//!                                          │fail          │fail          │fail
//!                                          └──────────────┴──────────────┴──► TransportUnavailable
//! ```
//!
//! Message and status callbacks are registered on the manager, not on
//! individual transports. The manager forwards each candidate's traffic
//! into its own registry, so callbacks survive fallback and later
//! reconnects without being re-registered.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{Capabilities, ClientMessage, Endpoints};
use crate::transport::{
    HandlerSet, MessageHandler, PollingTransport, SocketTransport, StatusHandler, StreamTransport,
    Transport, TransportKind,
};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for the best-effort capabilities fetch.
const CAPABILITIES_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-candidate connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ManagerConfig
// ============================================================================

/// Tunables for transport selection.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Preference order; infeasible kinds are filtered out.
    pub order: Vec<TransportKind>,
    /// Whether transports re-dial after a lost connection.
    pub reconnect: bool,
    /// Budget for each candidate's connect attempt.
    pub connect_timeout: Duration,
    /// Pinned certificate hash for WebTransport against dev servers.
    pub cert_hash: Option<[u8; 32]>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            order: TransportKind::default_order(),
            reconnect: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cert_hash: None,
        }
    }
}

// ============================================================================
// Candidate filtering
// ============================================================================

/// Filters a preference order down to feasible candidates.
///
/// - `Stream` needs the server to advertise WebTransport and the origin
///   to be secure
/// - `Socket` needs the server to advertise WebSockets
/// - `Polling` is always feasible; it is the fallback of last resort
///
/// Duplicates keep their first position.
#[must_use]
pub fn candidate_order(
    preferred: &[TransportKind],
    capabilities: &Capabilities,
    secure_origin: bool,
) -> Vec<TransportKind> {
    let mut seen = FxHashSet::default();
    preferred
        .iter()
        .copied()
        .filter(|kind| seen.insert(*kind))
        .filter(|kind| match kind {
            TransportKind::Stream => capabilities.webtransport && secure_origin,
            TransportKind::Socket => capabilities.supports_socket(),
            TransportKind::Polling => true,
        })
        .collect()
}

// ============================================================================
// ManagerInner
// ============================================================================

/// Shared state behind the [`TransportManager`] facade.
pub(crate) struct ManagerInner {
    /// Endpoint catalogue for the origin.
    endpoints: Endpoints,
    /// Page path handed to transports that quote it.
    path: Mutex<String>,
    /// Shared HTTP client for capabilities and the polling strategy.
    http: reqwest::Client,
    /// Selection tunables.
    config: ManagerConfig,
    /// Manager-level callback registry; transports forward into it.
    handlers: Arc<HandlerSet>,
    /// The transport that won selection, if any.
    active: Mutex<Option<Transport>>,
}

// ============================================================================
// TransportManager
// ============================================================================

/// Picks and owns the active transport for one page connection.
///
/// Cheap to clone; clones share the same active transport and handlers.
#[derive(Clone)]
pub struct TransportManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportManager")
            .field("active", &self.active_kind())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl TransportManager {
    /// Creates a manager for the given origin and page path.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        endpoints: Endpoints,
        path: impl Into<String>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                endpoints,
                path: Mutex::new(path.into()),
                http,
                config,
                handlers: Arc::new(HandlerSet::default()),
                active: Mutex::new(None),
            }),
        }
    }

    /// Registers a callback for decoded downstream messages.
    ///
    /// Survives fallback and reconnects; may be registered before or
    /// after `connect`.
    pub fn on_message(&self, handler: MessageHandler) {
        self.inner.handlers.add_message(handler);
    }

    /// Registers a callback for transport lifecycle changes.
    pub fn on_status(&self, handler: StatusHandler) {
        self.inner.handlers.add_status(handler);
    }

    /// Returns the kind of the transport that won selection.
    #[must_use]
    pub fn active_kind(&self) -> Option<TransportKind> {
        self.inner.active.lock().as_ref().map(Transport::kind)
    }

    /// Returns `true` while the active transport can pass traffic.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .active
            .lock()
            .as_ref()
            .is_some_and(Transport::is_connected)
    }

    /// Returns the active transport's session id, if it carries one.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner
            .active
            .lock()
            .as_ref()
            .and_then(Transport::session_id)
    }

    /// Records a navigation for transports that quote the page path.
    pub fn set_path(&self, path: &str) {
        *self.inner.path.lock() = path.to_string();
        if let Some(active) = self.inner.active.lock().as_ref() {
            active.set_path(path);
        }
    }

    /// Selects and connects a transport, trying candidates in order.
    ///
    /// Any previously active transport is closed first, so `connect`
    /// doubles as a full reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportUnavailable`] naming every candidate
    /// and its failure when none connects.
    pub async fn connect(&self) -> Result<TransportKind> {
        if let Some(previous) = self.inner.active.lock().take() {
            previous.close().await;
        }

        let capabilities = self.fetch_capabilities().await;
        let candidates = candidate_order(
            &self.inner.config.order,
            &capabilities,
            self.inner.endpoints.is_secure_origin(),
        );
        debug!(?candidates, "Transport candidates selected");

        let mut failures = Vec::new();
        for kind in candidates {
            let transport = self.build_transport(kind);
            self.attach_forwarders(&transport);

            match timeout(self.inner.config.connect_timeout, transport.connect()).await {
                Ok(Ok(())) => {
                    info!(transport = %kind, "Transport connected");
                    *self.inner.active.lock() = Some(transport);
                    return Ok(kind);
                }
                Ok(Err(e)) => {
                    warn!(transport = %kind, error = %e, "Transport failed to connect");
                    failures.push(format!("{kind}: {e}"));
                }
                Err(_elapsed) => {
                    let timeout_ms = self.inner.config.connect_timeout.as_millis() as u64;
                    let e = Error::connection_timeout(timeout_ms);
                    warn!(transport = %kind, error = %e, "Transport connect timed out");
                    transport.close().await;
                    failures.push(format!("{kind}: {e}"));
                }
            }
        }

        let summary = if failures.is_empty() {
            "no feasible transport candidates".to_string()
        } else {
            failures.join("; ")
        };
        Err(Error::transport_unavailable(summary))
    }

    /// Sends one upstream message over the active transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] when no transport won selection,
    /// otherwise whatever the active transport reports.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        let active = self
            .inner
            .active
            .lock()
            .clone()
            .ok_or_else(|| Error::not_connected("send message"))?;
        active.send(message).await
    }

    /// Closes the active transport, if any.
    pub async fn close(&self) {
        let active = self.inner.active.lock().take();
        if let Some(active) = active {
            active.close().await;
        }
    }

    // ========================================================================
    // Selection plumbing
    // ========================================================================

    /// Fetches advertised capabilities, falling back to the
    /// conservative assumption on any failure.
    async fn fetch_capabilities(&self) -> Capabilities {
        let url = match self.inner.endpoints.capabilities_url() {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "Cannot derive capabilities URL");
                return Capabilities::conservative();
            }
        };

        let response = match self
            .inner
            .http
            .get(url)
            .timeout(CAPABILITIES_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "Capabilities endpoint unavailable");
                return Capabilities::conservative();
            }
            Err(e) => {
                debug!(error = %e, "Capabilities fetch failed");
                return Capabilities::conservative();
            }
        };

        match response.json::<Capabilities>().await {
            Ok(capabilities) => {
                debug!(?capabilities, "Capabilities fetched");
                capabilities
            }
            Err(e) => {
                debug!(error = %e, "Malformed capabilities response");
                Capabilities::conservative()
            }
        }
    }

    /// Builds a disconnected transport of the given kind.
    fn build_transport(&self, kind: TransportKind) -> Transport {
        let endpoints = self.inner.endpoints.clone();
        let path = self.inner.path.lock().clone();

        match kind {
            TransportKind::Stream => Transport::Stream(StreamTransport::new(
                endpoints,
                path,
                self.inner.config.cert_hash,
                self.inner.config.reconnect,
            )),
            TransportKind::Socket => Transport::Socket(SocketTransport::new(
                endpoints,
                self.inner.config.reconnect,
            )),
            TransportKind::Polling => Transport::Polling(PollingTransport::new(
                self.inner.http.clone(),
                endpoints,
                path,
            )),
        }
    }

    /// Wires a candidate's traffic into the manager-level registry.
    ///
    /// Forwarders read the registry at call time, so callbacks added
    /// after `connect` still fire.
    fn attach_forwarders(&self, transport: &Transport) {
        let handlers = Arc::clone(&self.inner.handlers);
        transport.on_message(Arc::new(move |message| handlers.notify_message(message)));

        let handlers = Arc::clone(&self.inner.handlers);
        transport.on_status(Arc::new(move |status| handlers.notify_status(status)));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;
    use url::Url;
    use wiremock::matchers::{header, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::protocol::{EventData, Flavor, ServerMessage};
    use crate::transport::TransportStatus;

    fn caps(transports: &[&str], webtransport: bool) -> Capabilities {
        Capabilities {
            transports: transports.iter().map(ToString::to_string).collect(),
            webtransport,
            version: "0.0.1".to_string(),
        }
    }

    #[test]
    fn test_candidate_order_full_stack() {
        let order = candidate_order(
            &TransportKind::default_order(),
            &caps(&["websocket", "http"], true),
            true,
        );
        assert_eq!(
            order,
            vec![
                TransportKind::Stream,
                TransportKind::Socket,
                TransportKind::Polling
            ]
        );
    }

    #[test]
    fn test_candidate_order_drops_stream_without_capability() {
        let order = candidate_order(
            &TransportKind::default_order(),
            &caps(&["websocket", "http"], false),
            true,
        );
        assert_eq!(order, vec![TransportKind::Socket, TransportKind::Polling]);
    }

    #[test]
    fn test_candidate_order_drops_stream_on_insecure_origin() {
        let order = candidate_order(
            &TransportKind::default_order(),
            &caps(&["websocket", "http"], true),
            false,
        );
        assert_eq!(order, vec![TransportKind::Socket, TransportKind::Polling]);
    }

    #[test]
    fn test_candidate_order_drops_socket_without_capability() {
        let order = candidate_order(
            &TransportKind::default_order(),
            &caps(&["http"], false),
            true,
        );
        assert_eq!(order, vec![TransportKind::Polling]);
    }

    #[test]
    fn test_candidate_order_respects_preference() {
        let order = candidate_order(
            &[TransportKind::Polling, TransportKind::Socket],
            &caps(&["websocket", "http"], true),
            true,
        );
        assert_eq!(order, vec![TransportKind::Polling, TransportKind::Socket]);
    }

    #[test]
    fn test_candidate_order_dedupes_keeping_first() {
        let order = candidate_order(
            &[
                TransportKind::Polling,
                TransportKind::Socket,
                TransportKind::Polling,
            ],
            &caps(&["websocket", "http"], false),
            false,
        );
        assert_eq!(order, vec![TransportKind::Polling, TransportKind::Socket]);
    }

    fn manager_for(server: &MockServer, config: ManagerConfig) -> TransportManager {
        TransportManager::new(
            reqwest::Client::new(),
            Endpoints::new(Url::parse(&server.uri()).unwrap(), Flavor::PyWire),
            "/counter",
            config,
        )
    }

    async fn mount_capabilities(server: &MockServer, transports: &[&str]) {
        Mock::given(method("GET"))
            .and(url_path("/_pywire/capabilities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transports": transports,
                "webtransport": false,
                "version": "0.0.1",
            })))
            .mount(server)
            .await;
    }

    async fn mount_polling_backend(server: &MockServer) {
        Mock::given(method("POST"))
            .and(url_path("/_pywire/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionId": "s-1" })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/_pywire/poll"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(60)),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_falls_back_from_socket_to_polling() {
        let server = MockServer::start().await;
        mount_capabilities(&server, &["websocket", "http"]).await;
        // No WebSocket upgrade support on the mock server, so the
        // socket candidate fails its handshake and polling wins.
        mount_polling_backend(&server).await;

        let manager = manager_for(&server, ManagerConfig::default());
        let kind = manager.connect().await.unwrap();

        assert_eq!(kind, TransportKind::Polling);
        assert_eq!(manager.active_kind(), Some(TransportKind::Polling));
        assert!(manager.is_connected());
        assert_eq!(manager.session_id().unwrap().as_str(), "s-1");

        manager.close().await;
    }

    #[tokio::test]
    async fn test_all_candidates_failing_names_each() {
        let server = MockServer::start().await;
        // Nothing mounted: capabilities 404s into the conservative
        // assumption, then both socket and polling fail.

        let manager = manager_for(&server, ManagerConfig::default());
        let err = manager.connect().await.unwrap_err();

        assert!(matches!(err, Error::TransportUnavailable { .. }));
        let summary = err.to_string();
        assert!(summary.contains("socket:"), "missing socket in {summary}");
        assert!(summary.contains("polling:"), "missing polling in {summary}");

        assert!(!manager.is_connected());
        assert_eq!(manager.active_kind(), None);
    }

    #[tokio::test]
    async fn test_connect_retries_cleanly_after_total_failure() {
        let server = MockServer::start().await;

        let manager = manager_for(
            &server,
            ManagerConfig {
                order: vec![TransportKind::Polling],
                ..ManagerConfig::default()
            },
        );
        manager.connect().await.unwrap_err();

        // The backend appears; the same manager connects cleanly.
        mount_polling_backend(&server).await;
        let kind = manager.connect().await.unwrap();
        assert_eq!(kind, TransportKind::Polling);

        manager.close().await;
    }

    #[tokio::test]
    async fn test_slow_candidate_times_out_and_moves_on() {
        let server = MockServer::start().await;
        mount_capabilities(&server, &["websocket", "http"]).await;
        // The socket handshake stalls far past the connect budget.
        Mock::given(method("GET"))
            .and(url_path("/_pywire/ws"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
            .mount(&server)
            .await;
        mount_polling_backend(&server).await;

        let manager = manager_for(
            &server,
            ManagerConfig {
                connect_timeout: Duration::from_millis(250),
                ..ManagerConfig::default()
            },
        );
        let kind = manager.connect().await.unwrap();
        assert_eq!(kind, TransportKind::Polling);

        manager.close().await;
    }

    #[tokio::test]
    async fn test_handlers_survive_fallback_and_late_registration() {
        let server = MockServer::start().await;
        mount_capabilities(&server, &["websocket", "http"]).await;
        mount_polling_backend(&server).await;
        Mock::given(method("POST"))
            .and(url_path("/_pywire/event"))
            .and(header("X-PyWire-Session", "s-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "type": "update", "html": "<p>after</p>" })),
            )
            .mount(&server)
            .await;

        let manager = manager_for(&server, ManagerConfig::default());

        // One handler registered before connect, one after.
        let (early_tx, mut early_rx) = mpsc::unbounded_channel();
        manager.on_message(Arc::new(move |message| {
            let _ = early_tx.send(message.kind().to_string());
        }));
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        manager.on_status(Arc::new(move |status| {
            let _ = status_tx.send(status);
        }));

        manager.connect().await.unwrap();

        let (late_tx, mut late_rx) = mpsc::unbounded_channel();
        manager.on_message(Arc::new(move |message| {
            if let ServerMessage::Update { html } = message {
                let _ = late_tx.send(html.clone());
            }
        }));

        manager
            .send(&ClientMessage::Event {
                handler: "increment".to_string(),
                path: "/counter".to_string(),
                data: EventData::new("click"),
            })
            .await
            .unwrap();

        let early = tokio::time::timeout(Duration::from_secs(5), early_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(early, "update");
        let late = tokio::time::timeout(Duration::from_secs(5), late_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(late, "<p>after</p>");

        // The winning candidate reported its lifecycle through the
        // manager-level registry.
        let mut statuses = Vec::new();
        while let Ok(status) = status_rx.try_recv() {
            statuses.push(status);
        }
        assert!(statuses.contains(&TransportStatus::Connected));

        manager.close().await;
    }

    #[tokio::test]
    async fn test_send_without_connect_is_not_connected() {
        let server = MockServer::start().await;
        let manager = manager_for(&server, ManagerConfig::default());

        let err = manager
            .send(&ClientMessage::Relocate {
                path: "/about".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
    }
}
