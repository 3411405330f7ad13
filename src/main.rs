//! Status-rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                  STATUS PROXY                    │
//!   Client Request       │  ┌─────────┐    ┌──────────┐                     │
//!   ─────────────────────┼─▶│  http   │───▶│ upstream │─────────────────────┼──▶ App Server
//!                        │  │ server  │    │  client  │                     │
//!                        │  └─────────┘    └────┬─────┘                     │
//!                        │                      ▼                           │
//!                        │               ┌─────────────┐   ignored / not    │
//!                        │               │   filter    │── GET html gzip ─┐ │
//!                        │               └──────┬──────┘                  │ │
//!                        │                      ▼                         │ │
//!                        │  ┌──────────────────────────────────────┐      │ │
//!                        │  │ transcode: gunzip → inspect → gzip   │      │ │
//!                        │  │            (meta tag → status)       │      │ │
//!                        │  └──────────────────┬───────────────────┘      │ │
//!   Client Response      │                     ▼                          ▼ │
//!   ◀────────────────────┼──────────────── forward (status + body) ◀──────┘ │
//!                        └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use status_proxy::config::{resolve_config, ConfigOverrides};
use status_proxy::lifecycle::{signals, Shutdown};
use status_proxy::observability::{logging, metrics};
use status_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "status-proxy", version)]
#[command(about = "Reverse proxy that takes the HTTP status from an HTML meta tag", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream base URL.
    #[arg(long, env = "TARGET_URL")]
    target_url: Option<String>,

    /// Port to listen on.
    #[arg(short, long, env = "PROXY_PORT")]
    port: Option<u16>,

    /// Name of the meta tag holding the status.
    #[arg(long, env = "TARGET_META_NAME")]
    meta_name: Option<String>,

    /// File with path patterns that are never inspected.
    #[arg(long, env = "PROXY_IGNORE_FILE")]
    ignore_file: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            target_url: self.target_url.clone(),
            port: self.port,
            meta_name: self.meta_name.clone(),
            ignore_file: self.ignore_file.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.overrides())?;

    logging::init_logging(&config.observability);

    tracing::info!("status-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.target_url,
        meta_name = %config.inspection.meta_name,
        ignore_file = %config.inspection.ignore_file,
        settle_timeout_secs = config.timeouts.settle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Server is running");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("HTTP server closed.");
    Ok(())
}
