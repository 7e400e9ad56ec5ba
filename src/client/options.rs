//! Client configuration options.
//!
//! Provides a type-safe interface for tuning how the client connects:
//! framework flavor, transport preference order, reconnect behavior, and
//! the development-server certificate pin.
//!
//! # Example
//!
//! ```ignore
//! use pywire_client::{ClientOptions, TransportKind};
//!
//! let options = ClientOptions::new()
//!     .with_flavor(Flavor::PyHtml)
//!     .with_transports([TransportKind::Socket, TransportKind::Polling])
//!     .without_reconnect();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::protocol::Flavor;
use crate::transport::TransportKind;
use crate::transport::manager::ManagerConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default budget for each transport candidate's connect attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ClientOptions
// ============================================================================

/// Connection configuration for a [`Client`](crate::client::Client).
///
/// Controls which flavor prefix is spoken, which transports are tried and
/// in what order, and how aggressively lost connections are re-dialed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Framework flavor served at the origin.
    pub flavor: Flavor,

    /// Transport preference order; infeasible kinds are filtered at
    /// connect time.
    pub transports: Vec<TransportKind>,

    /// Whether transports re-dial after a lost connection.
    pub reconnect: bool,

    /// Budget for each candidate's connect attempt.
    pub connect_timeout: Duration,

    /// Pinned certificate hash for WebTransport against dev servers.
    ///
    /// Pages may also inject a hash; an explicit option wins.
    pub cert_hash: Option<[u8; 32]>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with the default flavor and transport order.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            flavor: Flavor::PyWire,
            transports: TransportKind::default_order(),
            reconnect: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            cert_hash: None,
        }
    }

    /// Creates options for a server speaking the `/_pyhtml` prefix.
    #[inline]
    #[must_use]
    pub fn pyhtml() -> Self {
        Self {
            flavor: Flavor::PyHtml,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the framework flavor.
    #[inline]
    #[must_use]
    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Replaces the transport preference order.
    #[inline]
    #[must_use]
    pub fn with_transports(mut self, kinds: impl IntoIterator<Item = TransportKind>) -> Self {
        self.transports = kinds.into_iter().collect();
        self
    }

    /// Restricts the client to a single transport.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.transports = vec![kind];
        self
    }

    /// Disables re-dialing after a lost connection.
    #[inline]
    #[must_use]
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = false;
        self
    }

    /// Sets the per-candidate connect budget.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Pins the development-server certificate hash.
    #[inline]
    #[must_use]
    pub fn with_cert_hash(mut self, hash: [u8; 32]) -> Self {
        self.cert_hash = Some(hash);
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ClientOptions {
    /// Validates the options configuration.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.transports.is_empty() {
            return Err("At least one transport kind is required".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Derives the transport manager configuration.
    ///
    /// `page_cert_hash` is the hash injected by the page, used when no
    /// explicit option pin is set.
    #[must_use]
    pub(crate) fn manager_config(&self, page_cert_hash: Option<[u8; 32]>) -> ManagerConfig {
        ManagerConfig {
            order: self.transports.clone(),
            reconnect: self.reconnect,
            connect_timeout: self.connect_timeout,
            cert_hash: self.cert_hash.or(page_cert_hash),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
