//! Atelier API server - JSON interface to the run/artifact lifecycle.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use atelier::io::config::load_config;
use atelier::io::memory_store::MemoryStore;
use atelier::io::sqlite_store::SqliteStore;
use atelier::lifecycle::Coordinator;

use crate::state::{AppState, ServerStore};

#[derive(Parser)]
#[command(name = "atelier-server")]
#[command(about = "JSON API for workspaces, runs, and versioned artifacts")]
struct Args {
    /// Project directory (contains .atelier/)
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Config file (defaults to .atelier/config.toml under the project directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the server to (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database file (overrides data_file)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Keep all records in memory; nothing is written to disk
    #[arg(long, conflicts_with = "data_file")]
    ephemeral: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atelier_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let config_path = args
        .config
        .unwrap_or_else(|| project_dir.join(".atelier").join("config.toml"));
    let cfg = load_config(&config_path)?;

    let store = if args.ephemeral {
        info!("using in-memory store");
        ServerStore::Ephemeral(MemoryStore::new())
    } else {
        let data_file = args
            .data_file
            .unwrap_or_else(|| cfg.data_file_under(&project_dir));
        info!(data_file = %data_file.display(), "opening store");
        let store = SqliteStore::open(&data_file)
            .with_context(|| format!("open store {}", data_file.display()))?;
        ServerStore::Durable(store)
    };
    let coordinator = Coordinator::from_config(store, &cfg)?;
    let state = AppState::new(coordinator);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let bind = args.bind.unwrap_or(cfg.server.bind);
    let port = args.port.unwrap_or(cfg.server.port);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
