//! Zenoh to HTTP telemetry gateway.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use skyrelay_gateway::dispatcher::request_stop;
use skyrelay_gateway::{
    BatchQueue, Dispatcher, GatewayConfig, MessageSchema, Receiver, Statistics, StatusReporter,
    TelemetrySubscriber,
};

/// How long each task gets to finish after shutdown is signalled.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Forward UAV fleet telemetry from Zenoh to an HTTP collector.
#[derive(Parser, Debug)]
#[command(name = "skyrelay-gateway")]
#[command(about = "Forward UAV fleet telemetry from Zenoh to an HTTP collector")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Collector base URL (overrides config).
    #[arg(long)]
    backend_url: Option<String>,

    /// Source topic (overrides config).
    #[arg(long)]
    topic: Option<String>,

    /// Message schema, e.g. uav_msgs/msg/UavGps (overrides config).
    #[arg(long)]
    message_type: Option<String>,

    /// Log level (trace, debug, info, warn, error; overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::load_from_file(path)?,
        None => GatewayConfig::default(),
    };

    if let Some(url) = &args.backend_url {
        config.backend.url = url.clone();
    }
    if let Some(topic) = &args.topic {
        config.source.topic = topic.clone();
    }
    if let Some(message_type) = &args.message_type {
        config.source.message_type = message_type.parse::<MessageSchema>()?;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn join(name: &str, handle: JoinHandle<()>) {
    match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(task = name, "Task failed: {}", e),
        Err(_) => warn!(task = name, "Task did not stop within {:?}", JOIN_TIMEOUT),
    }
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    skyrelay_common::init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting SkyRelay gateway");
    info!(
        topic = %config.source.topic,
        message_type = %config.source.message_type,
        endpoint = %config.backend.endpoint(),
        batch_size = config.pipeline.batch_size,
        batch_timeout_ms = config.pipeline.batch_timeout_ms,
        retry_count = config.pipeline.retry_count,
        retry_delay_ms = config.pipeline.retry_delay_ms,
        queue_capacity = config.pipeline.queue_capacity,
        "Configuration loaded"
    );

    let session = skyrelay_common::connect(&config.zenoh).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let stats = Arc::new(Statistics::new());
    let queue = Arc::new(BatchQueue::new(config.pipeline.queue_capacity));

    let receiver = Receiver::new(config.source.message_type, queue.clone(), stats.clone());
    let subscriber = TelemetrySubscriber::from_config(session.clone(), &config.source, receiver)?;
    let dispatcher =
        Dispatcher::from_config(&config, queue.clone(), stats.clone(), shutdown_rx.clone())?;

    let mut reporter = StatusReporter::new(stats.clone(), queue.clone(), config.status.interval());
    if let Some(key) = &config.status.publish_key {
        reporter = reporter.with_publisher(session.clone(), key.clone());
    }

    let dispatcher_task = dispatcher.spawn();

    let subscriber_shutdown = shutdown_rx.clone();
    let subscriber_task = tokio::spawn(async move {
        if let Err(e) = subscriber.run(subscriber_shutdown).await {
            error!("Subscriber error: {}", e);
        }
    });

    let reporter_task = reporter.clone().spawn(shutdown_rx);

    info!("Gateway running");

    if let Err(e) = wait_for_signal().await {
        error!("Failed to listen for shutdown signals: {}", e);
    }

    request_stop(&shutdown_tx);

    join("dispatcher", dispatcher_task).await;
    join("subscriber", subscriber_task).await;
    join("reporter", reporter_task).await;

    reporter.publish_offline().await;

    let final_stats = stats.snapshot();
    info!(
        received = final_stats.received,
        sent = final_stats.sent,
        errors = final_stats.send_errors,
        dropped = final_stats.dropped,
        discarded = queue.len(),
        "Final statistics"
    );

    if let Err(e) = session.close().await {
        warn!("Failed to close Zenoh session: {}", e);
    }

    info!("Gateway stopped");
    Ok(())
}
