//! Application shell.
//!
//! Everything below this module is a building block; the [`Client`] here
//! assembles them into one live page session:
//!
//! ```text
//!   ClientBuilder ──build()──▶ Client
//!                               │ open(path)
//!                  ┌────────────┼──────────────┐
//!            ┌─────▼─────┐ ┌────▼─────┐  ┌─────▼──────┐
//!            │ document  │ │ events   │  │ transport  │
//!            │ + updater │ │ dispatch │  │ manager    │
//!            └─────▲─────┘ └────┬─────┘  └─────▲──────┘
//!                  │            │ files?       │
//!                  │       ┌────▼─────┐        │
//!          update/reload   │ uploader │────────┘ event messages
//!                          └──────────┘
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Validated client construction |
//! | `options` | Connection options and transport preferences |
//! | `core` | The client facade, run loop, and synthetic input |
//! | `navigation` | Sibling-path patterns and session history |
//! | `upload` | Pre-event file uploads with the page token |

// ============================================================================
// Submodules
// ============================================================================

/// Validated construction.
pub mod builder;

/// Client facade and run loop.
pub mod core;

/// Path patterns and history.
pub mod navigation;

/// Connection options.
pub mod options;

/// Pre-event file uploads.
pub(crate) mod upload;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use self::core::{Client, ClientState, NavigationOutcome};
pub use navigation::{History, NavigationMeta, NavigationSet};
pub use options::ClientOptions;
pub use upload::MAX_UPLOAD_BYTES;
