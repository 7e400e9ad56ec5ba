//! HTTP long-polling transport.
//!
//! The fallback strategy for environments where neither WebTransport nor
//! WebSockets are available. Downstream traffic arrives by repeatedly
//! issuing a long-poll GET that the server holds open until it has
//! messages (or gives up and returns an empty batch); upstream events go
//! out as individual POSTs.
//!
//! # Session
//!
//! Unlike the connection-scoped strategies, polling carries an explicit
//! session id. `connect` obtains one from the session endpoint and every
//! subsequent request quotes it. When the server forgets the session
//! (expiry returns 404), the transport re-initializes exactly once and
//! resumes polling under the new id rather than spinning on the dead one.
//!
//! # Request pacing
//!
//! | Request | Timeout | On failure |
//! |---------|---------|------------|
//! | poll    | 45s (outlives the server's 30s hold) | fixed 1s delay, retry |
//! | event   | 30s | error to caller |
//! | session | 10s | error to caller / retry delay |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{ClientMessage, Endpoints, ServerMessage};
use crate::transport::{HandlerSet, MessageHandler, StatusHandler, TransportStatus};

// ============================================================================
// Constants
// ============================================================================

/// Per-request timeout for the long-poll GET.
///
/// Must outlive the server's 30s hold, with headroom for transit.
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Per-request timeout for event POSTs.
const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for session initialization.
const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed delay before retrying after a failed poll cycle.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Result of one poll cycle.
enum PollOutcome {
    /// Batch received and dispatched (possibly empty).
    Dispatched,
    /// The server no longer knows the session.
    SessionGone,
}

// ============================================================================
// PollingInner
// ============================================================================

/// Shared state behind the [`PollingTransport`] facade.
pub(crate) struct PollingInner {
    /// Endpoint catalogue for the origin.
    endpoints: Endpoints,
    /// Page path quoted during session initialization.
    ///
    /// Mutable so navigation is reflected when an expired session is
    /// re-initialized.
    path: Mutex<String>,
    /// Shared HTTP client.
    http: reqwest::Client,
    /// Registered message and status callbacks.
    handlers: HandlerSet,
    /// True while polling under a live session.
    connected: AtomicBool,
    /// Current session id, replaced on re-initialization.
    session: Mutex<Option<SessionId>>,
    /// Cancels the poll loop.
    cancel: CancellationToken,
}

// ============================================================================
// PollingTransport
// ============================================================================

/// HTTP long-polling wire strategy.
///
/// Cheap to clone; clones share the same session and handlers.
#[derive(Clone)]
pub struct PollingTransport {
    inner: Arc<PollingInner>,
}

impl fmt::Debug for PollingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingTransport")
            .field("connected", &self.is_connected())
            .field("session", &self.session_id())
            .finish_non_exhaustive()
    }
}

impl PollingTransport {
    /// Creates a disconnected polling transport for the given origin.
    #[must_use]
    pub fn new(http: reqwest::Client, endpoints: Endpoints, path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(PollingInner {
                endpoints,
                path: Mutex::new(path.into()),
                http,
                handlers: HandlerSet::default(),
                connected: AtomicBool::new(false),
                session: Mutex::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Registers a callback for decoded downstream messages.
    pub fn on_message(&self, handler: MessageHandler) {
        self.inner.handlers.add_message(handler);
    }

    /// Registers a callback for lifecycle changes.
    pub fn on_status(&self, handler: StatusHandler) {
        self.inner.handlers.add_status(handler);
    }

    /// Returns `true` while polling under a live session.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Returns the current session id, if connected.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.session.lock().clone()
    }

    /// Records a navigation so session re-initialization quotes the
    /// page actually being viewed.
    pub fn set_path(&self, path: impl Into<String>) {
        *self.inner.path.lock() = path.into();
    }

    /// Initializes a session and starts the poll loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the session
    /// endpoint is unreachable or rejects the request, and
    /// [`Error::Decode`](crate::Error::Decode) if its response carries
    /// no session id.
    pub async fn connect(&self) -> Result<()> {
        self.inner.handlers.notify_status(TransportStatus::Connecting);

        let session = Self::init_session(&self.inner).await?;
        *self.inner.session.lock() = Some(session);
        self.inner.connected.store(true, Ordering::SeqCst);
        self.inner.handlers.notify_status(TransportStatus::Connected);

        tokio::spawn(Self::poll_loop(Arc::clone(&self.inner)));
        Ok(())
    }

    /// Sends one upstream message as an event POST.
    ///
    /// The server answers each event with a single message (an update or
    /// an error), which is dispatched to message handlers here.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`](crate::Error::NotConnected) before `connect`
    /// - [`Error::SessionExpired`](crate::Error::SessionExpired) if the
    ///   server no longer knows the session
    /// - [`Error::Http`](crate::Error::Http) on network failure
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::not_connected("send event"));
        }
        let session = self.session_id().ok_or(Error::SessionExpired)?;

        let url = self.inner.endpoints.event_url()?;
        let response = self
            .inner
            .http
            .post(url)
            .timeout(EVENT_TIMEOUT)
            .header(
                self.inner.endpoints.flavor().session_header(),
                session.as_str(),
            )
            .json(message)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::SessionExpired);
        }

        let status = response.status();
        let text = response.text().await?;
        match ServerMessage::parse(&text) {
            Ok(reply) => {
                trace!(kind = reply.kind(), "Event reply received");
                self.inner.handlers.notify_message(&reply);
                Ok(())
            }
            Err(_) if !status.is_success() => Err(Error::connection(format!(
                "event endpoint returned {status}"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Stops the poll loop and forgets the session.
    ///
    /// Terminal: a closed transport stays closed.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    // ========================================================================
    // Poll loop
    // ========================================================================

    /// Polls until cancelled, re-initializing the session on expiry.
    async fn poll_loop(inner: Arc<PollingInner>) {
        loop {
            let Some(session) = inner.session.lock().clone() else {
                return;
            };

            let outcome = tokio::select! {
                () = inner.cancel.cancelled() => {
                    inner.handlers.notify_status(TransportStatus::Closed);
                    return;
                }
                outcome = Self::poll_once(&inner, &session) => outcome,
            };

            match outcome {
                // Hot loop on success: the server paces us by holding
                // the request open.
                Ok(PollOutcome::Dispatched) => {}

                Ok(PollOutcome::SessionGone) => {
                    debug!(session = %session, "Session expired on server");
                    inner.connected.store(false, Ordering::SeqCst);
                    inner.handlers.notify_status(TransportStatus::Disconnected);

                    match Self::init_session(&inner).await {
                        Ok(new_session) => {
                            debug!(session = %new_session, "Session re-initialized");
                            *inner.session.lock() = Some(new_session);
                            inner.connected.store(true, Ordering::SeqCst);
                            inner.handlers.notify_status(TransportStatus::Connected);
                        }
                        Err(e) => {
                            warn!(error = %e, "Session re-initialization failed");
                            if Self::wait_or_cancelled(&inner, POLL_RETRY_DELAY).await {
                                return;
                            }
                        }
                    }
                }

                Err(e) => {
                    debug!(error = %e, "Poll cycle failed");
                    if Self::wait_or_cancelled(&inner, POLL_RETRY_DELAY).await {
                        return;
                    }
                }
            }
        }
    }

    /// Issues one long-poll GET and dispatches the returned batch.
    async fn poll_once(inner: &Arc<PollingInner>, session: &SessionId) -> Result<PollOutcome> {
        let url = inner.endpoints.poll_url(session)?;
        let response = inner
            .http
            .get(url)
            .timeout(POLL_REQUEST_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(PollOutcome::SessionGone);
        }

        let batch: Vec<Value> = response.error_for_status()?.json().await?;
        trace!(count = batch.len(), "Poll batch received");

        // Dispatch in server order.
        for value in batch {
            match ServerMessage::from_value(value) {
                Ok(message) => inner.handlers.notify_message(&message),
                Err(e) => warn!(error = %e, "Failed to decode polled message"),
            }
        }
        Ok(PollOutcome::Dispatched)
    }

    /// Obtains a session id for this transport's page path.
    async fn init_session(inner: &Arc<PollingInner>) -> Result<SessionId> {
        let url = inner.endpoints.session_url()?;
        let path = inner.path.lock().clone();
        let body: Value = inner
            .http
            .post(url)
            .timeout(SESSION_TIMEOUT)
            .json(&serde_json::json!({ "path": path }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = body
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::decode("session response missing 'sessionId'"))?;
        Ok(SessionId::from(id))
    }

    /// Sleeps the retry delay; returns `true` if cancelled meanwhile.
    async fn wait_or_cancelled(inner: &Arc<PollingInner>, delay: Duration) -> bool {
        tokio::select! {
            () = inner.cancel.cancelled() => {
                inner.handlers.notify_status(TransportStatus::Closed);
                true
            }
            () = tokio::time::sleep(delay) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
