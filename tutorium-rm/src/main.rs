//! tutorium-rm (Resource Management) - Management resource analytics service
//!
//! Serves the management role's resource endpoints: tutor workload
//! overview, inefficiency detection, optimization plans, and the
//! approval-gated change applier.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tutorium_common::config::{ensure_data_dir, resolve_data_root, resolve_port, DEFAULT_RM_PORT};
use tutorium_common::store::JsonFileStore;
use tutorium_rm::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "tutorium-rm", about = "Tutorium resource management service")]
struct Cli {
    /// Data root holding the JSON collection files
    #[arg(long)]
    data_root: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber before anything that can log
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Tutorium Resource Management (tutorium-rm) v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cli = Cli::parse();

    let data_root = resolve_data_root(cli.data_root.as_deref(), "TUTORIUM_DATA_ROOT");
    ensure_data_dir(&data_root)?;
    info!("Data root: {}", data_root.display());

    let store = Arc::new(JsonFileStore::open(&data_root));
    let state = AppState::new(store);
    let app = build_router(state);

    let port = resolve_port(cli.port, "TUTORIUM_RM_PORT", DEFAULT_RM_PORT);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("tutorium-rm listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
