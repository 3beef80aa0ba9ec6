//! kvgate - HTTP gateway for Azure Key Vault secrets

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use kvgate::config::{Backend, Config};
use kvgate::{router, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "kvgate")]
#[command(about = "HTTP gateway for Azure Key Vault secrets", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./kvgate.toml when present)
    #[arg(short, long, env = "KVGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "KVGATE_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "KVGATE_HOST")]
    host: Option<String>,

    /// Secret backend
    #[arg(long, value_enum, env = "KVGATE_BACKEND")]
    backend: Option<Backend>,

    /// Maximum number of cached secrets
    #[arg(long, env = "KVGATE_CACHE_CAPACITY")]
    cache_capacity: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "KVGATE_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(backend) = self.backend {
            config.store.backend = backend;
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache.capacity = capacity;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "kvgate={0},kvgate_keyvault={0},kvgate_auth={0},tower_http=debug",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kvgate...");

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    let state = match server::build_state(&config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to initialize secret store");
            return Err(e.into());
        }
    };

    info!("  Backend: {:?}", config.store.backend);
    info!("  Store: {}", state.store_endpoint());
    info!("  Cache capacity: {}", config.cache.capacity);

    let app = router::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down kvgate");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
