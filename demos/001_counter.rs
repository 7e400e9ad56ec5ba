//! Basic counter demonstration.
//!
//! Demonstrates:
//! - Building a client and opening a page
//! - Clicking a bound element
//! - Waiting for the server's re-render to land
//!
//! Expects a PyWire app serving a counter page at `/counter` with an
//! `#increment` button and a `#count` readout.
//!
//! Usage:
//!   cargo run --example 001_counter
//!   cargo run --example 001_counter -- http://localhost:8000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use pywire_client::{Client, Result};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Counter ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Connecting to {}...", args.base_url);

    let client = Client::builder().base_url(&args.base_url).build()?;
    client.open("/counter").await?;
    println!(
        "        ✓ Page opened (state={}, transport={:?})\n",
        client.state(),
        client.transport()
    );

    // ========================================================================
    // Click the increment button
    // ========================================================================

    println!("[1] Click #increment three times...");
    for _ in 0..3 {
        let report = client.click("#increment")?;
        assert_eq!(report.handled, 1, "the button should carry one handler");
        common::settle().await;
    }
    println!("    ✓ Clicked");

    // ========================================================================
    // Read the server-rendered count
    // ========================================================================

    let count = client.text("#count")?;
    println!("[2] Count now reads: {count}\n");

    // ========================================================================
    // Done
    // ========================================================================

    println!("=== Counter demo finished ===\n");

    common::wait_for_exit(args.no_wait).await;

    println!("\n[Cleanup] Closing client...");
    client.close().await;
    println!("          ✓ Done");

    Ok(())
}
