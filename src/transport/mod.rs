//! Transport layer for delivering events upstream and updates downstream.
//!
//! Three wire strategies implement the same surface and are tried in
//! priority order by the [`TransportManager`]:
//!
//! ```text
//!                    ┌────────────────────┐
//!                    │  TransportManager  │
//!                    │ (priority + retry) │
//!                    └─────────┬──────────┘
//!            ┌─────────────────┼──────────────────┐
//!            ▼                 ▼                  ▼
//!   ┌────────────────┐ ┌───────────────┐ ┌────────────────┐
//!   │ StreamTransport│ │SocketTransport│ │PollingTransport│
//!   │ (WebTransport) │ │  (WebSocket)  │ │ (HTTP long-poll│
//!   │  QUIC streams  │ │ single duplex │ │  + POST event) │
//!   │  + datagrams   │ │  connection   │ │                │
//!   └────────────────┘ └───────────────┘ └────────────────┘
//! ```
//!
//! A transport owns its connection lifecycle, including reconnection with
//! exponential backoff where the strategy supports it. Consumers observe
//! traffic and lifecycle changes through registered callbacks; callbacks
//! live in the transport's [`HandlerSet`] rather than in any single
//! connection, so they keep firing across reconnects.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Reconnect phase machine and delay policy |
//! | `manager` | Priority fallback across the three strategies |
//! | `polling` | HTTP long-poll receive loop and POST sends |
//! | `socket` | WebSocket duplex connection |
//! | `stream` | WebTransport streams and datagrams |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{ClientMessage, ServerMessage};

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect phase machine and delay policy.
pub mod backoff;

/// Priority fallback across the three strategies.
pub mod manager;

/// HTTP long-poll receive loop and POST sends.
pub mod polling;

/// WebSocket duplex connection.
pub mod socket;

/// WebTransport streams and datagrams.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{BackoffPolicy, ReconnectPhase, ReconnectState};
pub use manager::TransportManager;
pub use polling::PollingTransport;
pub use socket::SocketTransport;
pub use stream::StreamTransport;

// ============================================================================
// TransportKind
// ============================================================================

/// Identifies one of the three wire strategies.
///
/// Order in a preference list is meaningful: earlier kinds are tried
/// first by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// WebTransport over QUIC: bidirectional streams plus datagrams.
    Stream,
    /// A single duplex WebSocket connection.
    Socket,
    /// HTTP long-polling for downstream, POST for upstream.
    Polling,
}

impl TransportKind {
    /// Returns the lowercase wire name for this kind.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stream => "stream",
            TransportKind::Socket => "socket",
            TransportKind::Polling => "polling",
        }
    }

    /// Default priority order, richest strategy first.
    #[inline]
    #[must_use]
    pub fn default_order() -> Vec<TransportKind> {
        vec![
            TransportKind::Stream,
            TransportKind::Socket,
            TransportKind::Polling,
        ]
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" | "webtransport" => Ok(TransportKind::Stream),
            "socket" | "websocket" => Ok(TransportKind::Socket),
            "polling" | "http" => Ok(TransportKind::Polling),
            other => Err(Error::config(format!(
                "unknown transport kind '{other}'. \
                 Expected one of: stream, socket, polling"
            ))),
        }
    }
}

// ============================================================================
// TransportStatus
// ============================================================================

/// Lifecycle notification emitted by a transport to status handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// An initial connection attempt is in flight.
    Connecting,
    /// Connected and passing traffic.
    Connected,
    /// Connection lost; a reconnect may follow.
    Disconnected,
    /// Waiting out a backoff delay before retrying.
    Reconnecting {
        /// 1-based retry attempt about to run.
        attempt: u32,
        /// Delay before that attempt, in milliseconds.
        next_retry_ms: u64,
    },
    /// Closed on purpose; no reconnect will follow.
    Closed,
}

impl TransportStatus {
    /// Returns `true` for the state in which traffic can flow.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, TransportStatus::Connected)
    }
}

// ============================================================================
// Handler plumbing
// ============================================================================

/// Callback invoked for every decoded downstream message.
pub type MessageHandler = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

/// Callback invoked on transport lifecycle changes.
pub type StatusHandler = Arc<dyn Fn(TransportStatus) + Send + Sync>;

/// Shared registry of message and status callbacks.
///
/// Owned by each transport for its whole lifetime, so registrations made
/// before `connect` and across reconnects keep firing.
#[derive(Default)]
pub(crate) struct HandlerSet {
    /// Message callbacks, invoked in registration order.
    message: RwLock<Vec<MessageHandler>>,
    /// Status callbacks, invoked in registration order.
    status: RwLock<Vec<StatusHandler>>,
}

impl HandlerSet {
    /// Registers a message callback.
    pub(crate) fn add_message(&self, handler: MessageHandler) {
        self.message.write().push(handler);
    }

    /// Registers a status callback.
    pub(crate) fn add_status(&self, handler: StatusHandler) {
        self.status.write().push(handler);
    }

    /// Invokes every message callback with the given message.
    ///
    /// Handlers are cloned out of the lock first so a handler may
    /// register further handlers without deadlocking.
    pub(crate) fn notify_message(&self, message: &ServerMessage) {
        let handlers = self.message.read().clone();
        for handler in &handlers {
            handler(message);
        }
    }

    /// Invokes every status callback with the given status.
    pub(crate) fn notify_status(&self, status: TransportStatus) {
        let handlers = self.status.read().clone();
        for handler in &handlers {
            handler(status);
        }
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("message_handlers", &self.message.read().len())
            .field("status_handlers", &self.status.read().len())
            .finish()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One of the three concrete wire strategies.
///
/// The set of strategies is fixed; call sites match exhaustively rather
/// than dispatching through a trait object.
#[derive(Debug, Clone)]
pub enum Transport {
    /// WebTransport over QUIC.
    Stream(StreamTransport),
    /// WebSocket.
    Socket(SocketTransport),
    /// HTTP long-polling.
    Polling(PollingTransport),
}

impl Transport {
    /// Returns which strategy this is.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Stream(_) => TransportKind::Stream,
            Transport::Socket(_) => TransportKind::Socket,
            Transport::Polling(_) => TransportKind::Polling,
        }
    }

    /// Establishes the connection and starts the receive loop.
    pub async fn connect(&self) -> Result<()> {
        match self {
            Transport::Stream(t) => t.connect().await,
            Transport::Socket(t) => t.connect().await,
            Transport::Polling(t) => t.connect().await,
        }
    }

    /// Sends one upstream message.
    pub async fn send(&self, message: &ClientMessage) -> Result<()> {
        match self {
            Transport::Stream(t) => t.send(message).await,
            Transport::Socket(t) => t.send(message).await,
            Transport::Polling(t) => t.send(message).await,
        }
    }

    /// Closes the connection and stops any reconnect loop.
    pub async fn close(&self) {
        match self {
            Transport::Stream(t) => t.close().await,
            Transport::Socket(t) => t.close().await,
            Transport::Polling(t) => t.close().await,
        }
    }

    /// Returns `true` while the transport can pass traffic.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        match self {
            Transport::Stream(t) => t.is_connected(),
            Transport::Socket(t) => t.is_connected(),
            Transport::Polling(t) => t.is_connected(),
        }
    }

    /// Registers a callback for decoded downstream messages.
    pub fn on_message(&self, handler: MessageHandler) {
        match self {
            Transport::Stream(t) => t.on_message(handler),
            Transport::Socket(t) => t.on_message(handler),
            Transport::Polling(t) => t.on_message(handler),
        }
    }

    /// Registers a callback for lifecycle changes.
    pub fn on_status(&self, handler: StatusHandler) {
        match self {
            Transport::Stream(t) => t.on_status(handler),
            Transport::Socket(t) => t.on_status(handler),
            Transport::Polling(t) => t.on_status(handler),
        }
    }

    /// Returns the server-assigned session id, if this strategy uses one.
    ///
    /// Only the polling transport carries an explicit session; stream and
    /// socket sessions are scoped to the connection itself.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Transport::Stream(_) | Transport::Socket(_) => None,
            Transport::Polling(t) => t.session_id(),
        }
    }

    /// Records a navigation on strategies that quote the page path when
    /// establishing or re-establishing themselves.
    pub fn set_path(&self, path: &str) {
        match self {
            Transport::Stream(t) => t.set_path(path),
            // Socket sessions never restate the path.
            Transport::Socket(_) => {}
            Transport::Polling(t) => t.set_path(path),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(TransportKind::Stream.as_str(), "stream");
        assert_eq!(TransportKind::Socket.as_str(), "socket");
        assert_eq!(TransportKind::Polling.as_str(), "polling");
        assert_eq!(TransportKind::Socket.to_string(), "socket");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "stream".parse::<TransportKind>().unwrap(),
            TransportKind::Stream
        );
        assert_eq!(
            "WebSocket".parse::<TransportKind>().unwrap(),
            TransportKind::Socket
        );
        assert_eq!(
            " http ".parse::<TransportKind>().unwrap(),
            TransportKind::Polling
        );
        assert!("carrier-pigeon".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_default_order_richest_first() {
        assert_eq!(
            TransportKind::default_order(),
            vec![
                TransportKind::Stream,
                TransportKind::Socket,
                TransportKind::Polling
            ]
        );
    }

    #[test]
    fn test_status_is_connected() {
        assert!(TransportStatus::Connected.is_connected());
        assert!(!TransportStatus::Connecting.is_connected());
        assert!(!TransportStatus::Disconnected.is_connected());
        assert!(
            !TransportStatus::Reconnecting {
                attempt: 1,
                next_retry_ms: 1000
            }
            .is_connected()
        );
        assert!(!TransportStatus::Closed.is_connected());
    }

    #[test]
    fn test_handler_set_fires_in_registration_order() {
        let set = HandlerSet::default();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            set.add_message(Arc::new(move |_| order.lock().push(tag)));
        }

        set.notify_message(&ServerMessage::Reload);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_handler_set_status_fanout() {
        let set = HandlerSet::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            set.add_status(Arc::new(move |status| {
                assert_eq!(status, TransportStatus::Connected);
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        set.notify_status(TransportStatus::Connected);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_set_debug_reports_counts() {
        let set = HandlerSet::default();
        set.add_message(Arc::new(|_| {}));

        let rendered = format!("{set:?}");
        assert!(rendered.contains("message_handlers: 1"));
        assert!(rendered.contains("status_handlers: 0"));
    }
}
