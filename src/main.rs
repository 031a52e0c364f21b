use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use polls::audit::TracingAuditLog;
use polls::commands::{self, USAGE};
use polls::config::Config;
use polls::db::dbclient::DBClient;
use polls::db::memory::MemoryRepository;
use polls::db::Repository;
use polls::handler::AppData;
use polls::routes;

async fn serve(config: &Config, repo: Arc<dyn Repository>) -> anyhow::Result<()> {
    let data = AppData::new(repo, Arc::new(TracingAuditLog), config.session_ttl());
    let app = routes::router(data);

    let address = config.address();
    let listener = TcpListener::bind(&address).await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("Server running on {address}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down.");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;

    let args = env::args().skip(1).collect::<Vec<_>>();
    match args.first().map(String::as_str) {
        None | Some("serve") => {
            let repo: Arc<dyn Repository> = match &config.database_url {
                Some(url) => Arc::new(DBClient::new(url, config.db_max_connections).await?),
                None => {
                    warn!("No database configured; using in-memory storage, nothing will persist.");
                    Arc::new(MemoryRepository::new())
                }
            };

            serve(&config, repo).await
        }
        Some("add-user") => commands::add_user(&config, &args[1..]).await.map(|_| ()),
        Some(other) => bail!("unknown command '{}'; {}", other, USAGE),
    }
}
