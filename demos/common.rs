//! Helpers shared by the demo programs.
//!
//! Every demo takes an optional server URL plus `--debug` and `--no-wait`
//! flags, logs through `tracing`, and holds the session open until Ctrl+C
//! so the page can be watched from a browser tab at the same time.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Server used when no URL is given on the command line.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// How long a demo waits for a server re-render to land.
pub const SETTLE_DELAY: Duration = Duration::from_millis(200);

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub base_url: String,
    pub debug: bool,
    pub no_wait: bool,
}

impl Args {
    /// Parses the command line: first bare argument is the server URL,
    /// flags may appear anywhere.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let base_url = args
            .iter()
            .skip(1)
            .find(|a| !a.starts_with("--"))
            .cloned()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initializes tracing. `RUST_LOG` wins over the `--debug` flag.
pub fn init_logging(debug: bool) {
    let fallback = if debug {
        "pywire_client=debug"
    } else {
        "pywire_client=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();
}

/// Gives the server's re-render time to arrive and patch in.
pub async fn settle() {
    tokio::time::sleep(SETTLE_DELAY).await;
}

/// Holds the session open until Ctrl+C, unless `--no-wait` was given.
pub async fn wait_for_exit(no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Exiting immediately");
        return;
    }

    println!("Session stays open. Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await.ok();
}
