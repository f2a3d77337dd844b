//! sidecar - serves search engine scrapers over a stateless JSON API.
//!
//! Each request resolves an engine from the manifest, runs it with injected
//! network and continuation dependencies, and returns its results.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engine_sidecar::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "engine_sidecar=debug"
    } else {
        "engine_sidecar=info"
    };

    // Logs go to stderr so `dispatch` output on stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run().await
}
