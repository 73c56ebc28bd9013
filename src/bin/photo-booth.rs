//! Photo booth CLI tool
//!
//! Command-line front end for composing captures into templates, keying overlays
//! and uploading results.

#[cfg(feature = "cli")]
use photo_booth::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
