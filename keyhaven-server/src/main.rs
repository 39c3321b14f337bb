//! KeyHaven API server
//!
//! A multi-user encrypted credential vault. Secrets are encrypted at
//! rest under per-user keys, which are themselves wrapped by a server
//! master key sourced from the environment -- the database alone is
//! never sufficient to recover a stored secret.

mod auth;
mod cleanup;
mod config;
mod error;
mod extract;
mod handlers;
mod oauth;
mod rate_limit;
mod server;
mod storage;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keyhaven-server", about = "KeyHaven credential vault API server")]
struct Cli {
    /// Listen address override
    #[arg(short, long)]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::ServerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }

    let storage = match storage::Storage::open(&cfg.database_path) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Database migration failed: {}", e);
            std::process::exit(2);
        }
    };

    cleanup::spawn_cleanup_task(storage.clone());

    let listen_addr = cfg.listen_addr.clone();
    let state = server::AppState::new(storage, cfg)?;
    let app = server::build_router(state);

    tracing::info!("Starting KeyHaven server on {}", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
