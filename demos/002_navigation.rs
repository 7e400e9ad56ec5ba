//! Navigation demonstration.
//!
//! Demonstrates:
//! - Sibling-path relocation over the live transport
//! - Full page loads for paths outside the navigation set
//! - History navigation (back)
//! - Link clicking with handler interception
//!
//! Usage:
//!   cargo run --example 002_navigation
//!   cargo run --example 002_navigation -- http://localhost:8000 --no-wait

mod common;

// ============================================================================
// Imports
// ============================================================================

use common::Args;
use pywire_client::{Client, NavigationOutcome, Result};

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
    println!("=== 002: Navigation ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Connecting to {}...", args.base_url);

    let client = Client::builder().base_url(&args.base_url).build()?;
    client.open("/").await?;
    println!(
        "        ✓ Page opened (title={:?})\n",
        client.title().unwrap_or_default()
    );

    // ========================================================================
    // Navigate
    // ========================================================================

    println!("[1] Navigate to /about...");
    let outcome = client.navigate("/about").await?;
    match outcome {
        NavigationOutcome::Relocated => println!("    ✓ Relocated over the live transport"),
        NavigationOutcome::FullLoad => println!("    ✓ Loaded as a full page"),
    }
    println!("    Path: {}", client.path());
    println!("    Title: {:?}\n", client.title().unwrap_or_default());

    // ========================================================================
    // History: Back
    // ========================================================================

    println!("[2] Go back...");
    client.back().await?;
    println!("    ✓ Back at: {}\n", client.path());
    assert_eq!(client.path(), "/", "back should return to the start page");

    // ========================================================================
    // Click a link
    // ========================================================================

    println!("[3] Click the first page link...");
    match client.click_link("a").await? {
        Some(outcome) => println!("    ✓ Navigated ({outcome:?}) to {}", client.path()),
        None => println!("    ✓ A handler prevented the navigation"),
    }
    println!();

    // ========================================================================
    // Done
    // ========================================================================

    println!("=== Navigation demo finished ===\n");

    common::wait_for_exit(args.no_wait).await;

    println!("\n[Cleanup] Closing client...");
    client.close().await;
    println!("          ✓ Done");

    Ok(())
}
