//! CloudEvents work relay.
//!
//! Accepts manifest envelopes over gRPC (`v1.CloudEventsService/Send`) and a
//! REST gateway, persists them as resource records, and streams status
//! envelopes back to `Watch` subscribers.
//!
//! ```text
//!   Send / POST /v1/cloudevents
//!        │
//!        ▼
//!   ┌──────────┐   put    ┌───────┐
//!   │  ingest  │────────▶│ store │
//!   └────┬─────┘          └───────┘
//!        │ publish
//!        ▼
//!   ┌──────────────────┐  subscription  ┌─────────┐
//!   │ propagation hub  │──────────────▶│  relay  │──▶ Watch stream
//!   └──────────────────┘                └─────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use cloudevents_relay::config::{load_config, RelayConfig};
use cloudevents_relay::lifecycle::{wait_for_signal, Application, Shutdown};
use cloudevents_relay::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "cloudevents-relay")]
#[command(about = "CloudEvents work relay", long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    init_logging(&config.observability.log_level, config.observability.log_format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        grpc_address = %config.grpc.bind_address,
        gateway_enabled = config.gateway.enabled,
        gateway_address = %config.gateway.bind_address,
        delivery_mode = ?config.relay.delivery_mode,
        "cloudevents-relay starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = Application::new(config)?;
    let shutdown = Shutdown::new();

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger();
        });
    }

    app.run(shutdown).await?;
    Ok(())
}
