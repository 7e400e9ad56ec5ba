//! Form interaction demonstration.
//!
//! Demonstrates:
//! - Typing into inputs (live value + input events)
//! - Checkboxes and selects
//! - Attaching an in-memory file
//! - Submitting; the file uploads ahead of the submit event
//!
//! Expects a PyWire app serving a form page at `/signup` with `#name`,
//! `#newsletter`, a `[name=avatar]` file input, and a `#signup-form`.
//!
//! Usage:
//!   cargo run --example 003_forms
//!   cargo run --example 003_forms -- http://localhost:8000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::sleep;

use common::Args;
use pywire_client::{AttachedFile, Client, Result};

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
    println!("=== 003: Forms ===\n");

    // ========================================================================
    // Setup
    // ========================================================================

    println!("[Setup] Connecting to {}...", args.base_url);

    let client = Client::builder().base_url(&args.base_url).build()?;
    client.open("/signup").await?;
    println!("        ✓ Page opened\n");

    // ========================================================================
    // Fill the form
    // ========================================================================

    println!("[1] Type a name...");
    client.set_value("#name", "Ada Lovelace")?;
    println!("    ✓ Value: {:?}", client.value("#name")?);

    println!("[2] Tick the newsletter box...");
    client.set_checked("#newsletter", true)?;
    println!("    ✓ Checked");

    println!("[3] Attach an avatar...");
    let avatar = AttachedFile::new("avatar.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    client.attach_file("[name=avatar]", avatar)?;
    println!("    ✓ Attached\n");

    // ========================================================================
    // Submit
    // ========================================================================

    println!("[4] Submit...");
    let report = client.submit("#signup-form")?;
    assert!(report.prevented, "handled submits never reload the page");
    println!("    ✓ Submitted (handlers: {})", report.handled);

    // Give the upload and the server round trip a moment.
    sleep(Duration::from_millis(500)).await;
    println!("    Page now: {:?}\n", client.title().unwrap_or_default());

    // ========================================================================
    // Done
    // ========================================================================

    println!("=== Forms demo finished ===\n");

    common::wait_for_exit(args.no_wait).await;

    println!("\n[Cleanup] Closing client...");
    client.close().await;
    println!("          ✓ Done");

    Ok(())
}
