//! Error types for the PyWire client runtime.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```no_run
//! use pywire_client::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.open("/").await?;
//!     client.click("#submit")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::NotConnected`], [`Error::TransportUnavailable`] |
//! | Session | [`Error::SessionExpired`] |
//! | Wire | [`Error::Decode`] |
//! | Document | [`Error::Patch`], [`Error::Selector`], [`Error::NodeNotFound`] |
//! | Navigation | [`Error::Navigation`] |
//! | Upload | [`Error::Upload`], [`Error::UploadTooLarge`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    ///
    /// Returned when a single transport cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt timed out.
    ///
    /// Returned when a transport does not become ready within the
    /// configured window.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation requires an active transport.
    ///
    /// Returned by send paths when no transport is connected.
    #[error("Not connected: {operation}")]
    NotConnected {
        /// The operation that required a connection.
        operation: String,
    },

    /// Every candidate transport failed to connect.
    ///
    /// Terminal for one `connect()` call; callers may call `connect()`
    /// again.
    #[error("All transports failed: {summary}")]
    TransportUnavailable {
        /// One `kind: error` entry per attempted candidate.
        summary: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Polling session no longer known to the server.
    ///
    /// Corresponds to the distinguished 404 on the poll endpoint. The
    /// polling transport recovers from this internally by re-connecting.
    #[error("Session expired")]
    SessionExpired,

    // ========================================================================
    // Wire Errors
    // ========================================================================
    /// Message decode failure.
    ///
    /// Returned when an inbound frame is not a valid protocol message.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Document Errors
    // ========================================================================
    /// Patch application failure.
    ///
    /// The updater recovers by replacing the whole document.
    #[error("Patch error: {message}")]
    Patch {
        /// Description of the patch failure.
        message: String,
    },

    /// Selector could not be parsed.
    #[error("Invalid selector: {message}")]
    Selector {
        /// Description of the selector problem.
        message: String,
    },

    /// No element matched the selector.
    #[error("Element not found: {selector}")]
    NodeNotFound {
        /// Selector used for the lookup.
        selector: String,
    },

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// Client-side navigation refused or failed.
    #[error("Navigation error: {message}")]
    Navigation {
        /// Description of the navigation failure.
        message: String,
    },

    // ========================================================================
    // Upload Errors
    // ========================================================================
    /// File upload rejected or failed.
    ///
    /// Aborts the submission that triggered it; the form is untouched.
    #[error("Upload failed: {message}")]
    Upload {
        /// Description of the upload failure.
        message: String,
    },

    /// Attached file exceeds the per-file size limit.
    #[error("Upload too large: field {field} is {size} bytes (limit {limit})")]
    UploadTooLarge {
        /// Form field carrying the file.
        field: String,
        /// Size of the attached file in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        limit: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a not-connected error.
    #[inline]
    pub fn not_connected(operation: impl Into<String>) -> Self {
        Self::NotConnected {
            operation: operation.into(),
        }
    }

    /// Creates an aggregate all-transports-failed error.
    #[inline]
    pub fn transport_unavailable(summary: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            summary: summary.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a patch error.
    #[inline]
    pub fn patch(message: impl Into<String>) -> Self {
        Self::Patch {
            message: message.into(),
        }
    }

    /// Creates a selector error.
    #[inline]
    pub fn selector(message: impl Into<String>) -> Self {
        Self::Selector {
            message: message.into(),
        }
    }

    /// Creates an element-not-found error.
    #[inline]
    pub fn node_not_found(selector: impl Into<String>) -> Self {
        Self::NodeNotFound {
            selector: selector.into(),
        }
    }

    /// Creates a navigation error.
    #[inline]
    pub fn navigation(message: impl Into<String>) -> Self {
        Self::Navigation {
            message: message.into(),
        }
    }

    /// Creates an upload error.
    #[inline]
    pub fn upload(message: impl Into<String>) -> Self {
        Self::Upload {
            message: message.into(),
        }
    }

    /// Creates an upload-too-large error.
    #[inline]
    pub fn upload_too_large(field: impl Into<String>, size: usize, limit: usize) -> Self {
        Self::UploadTooLarge {
            field: field.into(),
            size,
            limit,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. } => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::ConnectionTimeout { .. }
            | Self::NotConnected { .. }
            | Self::TransportUnavailable { .. }
            | Self::WebSocket(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if this is the distinguished session-expiry error.
    #[inline]
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is an upload error.
    #[inline]
    #[must_use]
    pub fn is_upload_error(&self) -> bool {
        matches!(self, Self::Upload { .. } | Self::UploadTooLarge { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry (reconnect or re-session).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Connection { .. }
            | Self::ConnectionTimeout { .. }
            | Self::SessionExpired
            | Self::WebSocket(_) => true,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
