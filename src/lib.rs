//! PyWire client - headless client for server-rendered reactive pages.
//!
//! This library speaks the PyWire/PyHTML wire protocol: the server owns all
//! application state and renders full HTML; the client keeps a live DOM,
//! reports user events upstream, and morphs the page in place whenever the
//! server pushes a new render.
//!
//! # Architecture
//!
//! The client follows the framework's thin-client model:
//!
//! - **Server (Python)**: Runs handlers, re-renders pages, pushes HTML
//! - **Client (Rust)**: Keeps the DOM, dispatches events, patches updates
//!
//! Key design principles:
//!
//! - One [`Client`] owns: document + transport + dispatcher + run loop
//! - Transports negotiate down: WebTransport, WebSocket, HTTP polling
//! - Patches preserve user state (focus, input values, scroll) by node key
//! - Event semantics live in markup (`data-on-*` / `data-modifiers-*`)
//!
//! # Quick Start
//!
//! ```no_run
//! use pywire_client::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Point the client at a running PyWire app
//!     let client = Client::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!
//!     // Fetch the page and dial the best transport
//!     client.open("/counter").await?;
//!
//!     // Interact; the server's re-render arrives as a patch
//!     client.click("#increment")?;
//!     println!("Count: {}", client.text("#count")?);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Application shell: [`Client`], navigation, uploads |
//! | [`dom`] | Live document and keyed reconciliation |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`event`] | Bindings, modifiers, and the event dispatcher |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and endpoint catalogue |
//! | [`transport`] | Transport negotiation and delivery (internal) |
//!
//! # Features
//!
//! - **Graceful degradation**: transport fallback, reconnect with backoff
//! - **State-preserving patches**: focused input keeps its text and caret
//! - **Full event pipeline**: propagation, gates, debounce and throttle
//! - **Uploads**: attached files travel ahead of their submit event

// ============================================================================
// Modules
// ============================================================================

/// Application shell.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Live document and reconciliation.
///
/// This module contains the DOM side of the runtime:
///
/// - [`Document`] - Arena document with live form state
/// - [`DomUpdater`] - Applies server renders as in-place patches
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Event bindings and dispatch.
///
/// Markup-declared handlers, modifier parsing, and the dispatcher that
/// turns synthetic interactions into wire events.
pub mod event;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Server/client message structures and the per-flavor endpoint catalogue.
pub mod protocol;

/// Transport negotiation and delivery.
///
/// Internal module handling transport selection, reconnection, and the
/// three concrete transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Shell types
pub use client::{
    Client, ClientBuilder, ClientOptions, ClientState, History, MAX_UPLOAD_BYTES,
    NavigationMeta, NavigationOutcome, NavigationSet,
};

// DOM types
pub use dom::{AttachedFile, Document, DomUpdater, ElementData, NodeId, UpdateOutcome};

// Error types
pub use error::{Error, Result};

// Event types
pub use event::{
    DispatchReport, EventDispatcher, EventType, Key, KeyPress, ModifierSet, SyntheticEvent,
};

// Identifier types
pub use identifiers::{SessionId, UploadId};

// Protocol types
pub use protocol::{
    Capabilities, ClientMessage, Endpoints, EventData, Flavor, ServerMessage,
};

// Transport types
pub use transport::{TransportKind, TransportManager, TransportStatus};
