//! Vidgate ingest daemon.
//!
//! Usage:
//!   vidgate-server --video-directory /srv/videos --port 7005 \
//!                  --num-threads 4 --max-queue-length 16

use clap::Parser;
use tracing::info;

// ---

use vidgate_server::{Config, Server};

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---

    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(!no_color)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "vidgate-server starting",
    );

    let server = Server::start(cfg).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();

    Ok(())
}
