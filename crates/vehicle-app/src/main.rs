//! # Vehicle Signal Bridge
//!
//! Main entry point.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Install logging
//! 3. Validate configuration
//! 4. Create the in-process databroker, signal client and message bus
//! 5. Start the simulated provider (if enabled)
//! 6. Run the brake-light app until SIGINT / SIGTERM
//!
//! Everything runs on one thread: handlers, holds and the lifecycle share a
//! single event loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use signal_bus::InMemoryMessageBus;
use vehicle_app::{AppConfig, AppLifecycle, BrakeLightApp, SimulatedProvider};
use vehicle_signals::{InMemoryDatabroker, VehicleSignalClient};

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")?;
    Ok(())
}

/// Completes on Ctrl+C, or on SIGTERM where available.
async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!(error = %e, "Ctrl+C handler failed");
                        }
                    }
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, using Ctrl+C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler failed");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_logging(&config.runtime.log_level)?;
    config.validate().context("Invalid configuration")?;

    info!("===========================================");
    info!("  Vehicle Signal Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        broker = %config.broker.address,
        "Using in-process simulated databroker, configured address is not dialed"
    );

    let broker = Arc::new(InMemoryDatabroker::standard());
    let client = Arc::new(
        VehicleSignalClient::new(broker.clone()).with_request_timeout(config.broker.request_timeout),
    );
    let bus = Arc::new(InMemoryMessageBus::new());

    let app = Arc::new(BrakeLightApp::new(&config, bus.clone()));
    let mut lifecycle = AppLifecycle::new(app, client, bus.clone())
        .with_shutdown_grace(config.runtime.shutdown_grace);

    let provider = config.provider.feed_interval.map(|interval| {
        tokio::spawn(SimulatedProvider::new(broker.clone(), interval).run(lifecycle.shutdown_signal()))
    });

    info!("Press Ctrl+C to stop.");
    let outcome = lifecycle.run(termination_signal()).await;

    bus.close();
    if let Some(provider) = provider {
        if let Err(e) = provider.await {
            warn!(error = %e, "Provider task failed");
        }
    }

    outcome.context("Vehicle app failed")?;
    info!("Shutdown complete");
    Ok(())
}
