//! Sensor Aggregator CLI
//!
//! Runs the sliding-window aggregation engine behind an HTTP ingest
//! boundary.

use clap::{Parser, Subcommand};
use sensor_aggregator::{
    config::Config,
    engine::Engine,
    publish::{ChannelPublisher, Publisher, WebhookPublisher},
    server,
    store::MemoryStore,
    VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sensor-aggregator")]
#[command(version = VERSION)]
#[command(about = "Sliding-window aggregation engine for keyed sensor telemetry", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine and the HTTP ingest server
    Run {
        /// Path to a JSON config file (defaults to the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the HTTP listen port
        #[arg(long)]
        port: Option<u16>,

        /// Override the window size in seconds
        #[arg(long)]
        window_size: Option<u64>,

        /// Override the flush cadence in seconds
        #[arg(long)]
        publish_interval: Option<u64>,

        /// Override the reported percentile
        #[arg(long)]
        percentile: Option<f64>,

        /// POST aggregate records to this webhook instead of stdout
        #[arg(long)]
        publish_url: Option<String>,
    },

    /// Show the effective configuration
    Config {
        /// Path to a JSON config file (defaults to the user config dir)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_aggregator=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            port,
            window_size,
            publish_interval,
            percentile,
            publish_url,
        } => {
            let mut cfg = Config::load(config.as_ref())?;
            if let Some(port) = port {
                cfg.listen_port = port;
            }
            if let Some(secs) = window_size {
                cfg.window_size = std::time::Duration::from_secs(secs);
            }
            if let Some(secs) = publish_interval {
                cfg.publish_interval = std::time::Duration::from_secs(secs);
            }
            if let Some(p) = percentile {
                cfg.percentile = p;
            }
            if publish_url.is_some() {
                cfg.publish_url = publish_url;
            }
            cfg.validate()?;

            cmd_run(cfg).await
        }
        Commands::Config { config } => {
            let cfg = Config::load(config.as_ref())?;
            println!("Config file: {:?}", Config::config_path());
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let instance_id = instance_id();
    tracing::info!(instance_id = %instance_id, version = VERSION, "starting sensor aggregator");
    tracing::info!(
        window_secs = config.window_size.as_secs(),
        interval_secs = config.publish_interval.as_secs(),
        percentile = config.percentile,
        prefix = %config.store_key_prefix,
        "engine configuration"
    );

    let store = Arc::new(MemoryStore::new());

    // Aggregate records go either to a webhook or to stdout as JSON lines.
    let (publisher, records): (Arc<dyn Publisher>, _) = match &config.publish_url {
        Some(url) => {
            tracing::info!(url = %url, "publishing aggregate records to webhook");
            (Arc::new(WebhookPublisher::new(url.clone())), None)
        }
        None => {
            let (publisher, receiver) = ChannelPublisher::new();
            (Arc::new(publisher), Some(receiver))
        }
    };

    let engine = Arc::new(Engine::new(&config, store, publisher));

    if let Some(mut receiver) = records {
        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                match serde_json::to_string(&record) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::error!(error = %e, "failed to encode aggregate record"),
                }
            }
        });
    }

    let (addr, server_shutdown) = server::run(config.listen_port, engine.clone()).await?;
    tracing::info!(addr = %addr, "accepting readings");

    let (scheduler_shutdown, shutdown_rx) = tokio::sync::oneshot::channel();
    let scheduler = tokio::spawn(engine.clone().run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    let _ = scheduler_shutdown.send(());
    let _ = server_shutdown.send(());
    let _ = scheduler.await;

    let stats = engine.stats();
    tracing::info!(
        readings_accepted = stats.readings_accepted,
        readings_dropped = stats.readings_dropped,
        flush_cycles = stats.flush_cycles,
        records_published = stats.records_published,
        keys_drained = stats.keys_drained,
        "final counters"
    );

    Ok(())
}

/// Instance ID from hostname plus a short random suffix.
fn instance_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("aggregator-{}-{}", host, &uuid::Uuid::new_v4().to_string()[..8])
}
