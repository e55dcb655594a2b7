use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use coordwatch::config::Config;
use coordwatch::ingest::source::build_source;
use coordwatch::monitor::Monitor;
use coordwatch::pipeline::DetectionPipeline;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("CoordWatch starting");

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    tracing::info!(
        source = %config.source.path,
        interval_secs = config.monitor.interval_secs,
        "Configuration loaded from {}",
        config_path
    );

    // Build the detectors once; every pass shares them
    let pipeline = Arc::new(DetectionPipeline::init(&config));
    tracing::info!(markets = pipeline.markets.len(), "Detection pipeline initialized");

    let source = Arc::from(build_source(&config.source));

    // Create shutdown signal
    let shutdown = CancellationToken::new();
    let (monitor, handle) = Monitor::new(&config, source, pipeline, shutdown.clone());

    // Spawn API server
    if config.api.enabled {
        let api_handle = handle.clone();
        let host = config.api.host.clone();
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = coordwatch::api::serve(api_handle, &host, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        });
    }

    let mut monitor_task = tokio::spawn(monitor.run());
    tracing::info!("Monitor running. Press Ctrl+C to stop.");

    // Wait for shutdown signal or for the monitor to give up on its own
    let outcome = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutdown signal received, stopping monitor...");
            shutdown.cancel();
            monitor_task.await
        }
        outcome = &mut monitor_task => outcome,
    };

    match outcome {
        Ok(Ok(())) => tracing::info!("CoordWatch stopped gracefully"),
        Ok(Err(e)) => tracing::error!(error = %e, "Monitor stopped"),
        Err(e) => tracing::error!(error = %e, "Monitor task failed"),
    }
    Ok(())
}
