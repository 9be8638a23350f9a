#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! clocksyncd entrypoint: parse config, start the node, serve metrics, and
//! run until `Ctrl-C` or a termination signal.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clocksync::config::{Cli, LogFormat, Settings};
use clocksync::core::time::SystemClock;
use clocksync::monitoring::{http, metrics::Metrics};
use clocksync::node::Node;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    let result = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    let _ = result;
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let settings = match Settings::load(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    let metrics = match Metrics::new() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("metrics init failed: {e}");
            std::process::exit(1);
        }
    };

    let clock = Arc::new(SystemClock::new());

    let node = match Node::bind(settings.clone(), metrics.clone(), clock).await {
        Ok(n) => Arc::new(n),
        Err(e) => {
            eprintln!("failed to start node: {e}");
            std::process::exit(1);
        }
    };

    info!(id = %node.id(), host = %settings.host, port = settings.port, peers = settings.peers.len(), "clocksync node starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(addr) = settings.metrics_addr.clone() {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(&addr, metrics).await {
                error!(error = %e, "metrics exporter exited");
            }
        });
    }

    let node_handle = tokio::spawn(node.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to install signal handler"),
    }

    let _ = shutdown_tx.send(true);
    let _ = node_handle.await;
}
