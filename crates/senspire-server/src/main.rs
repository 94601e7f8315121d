//! Main entry point for the Senspire engine host.
//!
//! Loads configuration, initializes logging and metrics, brings up the
//! storage backend and engine, then runs until Ctrl+C or SIGTERM.

use senspire_server::{
    Configuration, Engine,
    startup::{self, ShutdownSignal},
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new()?;

    let _logging_guard = startup::init_logging(&configuration.logging_config())?;
    senspire_server::metrics::init_metrics();

    let engine = match Engine::from_configuration(&configuration).await {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "Failed to start engine");
            return Err(e);
        }
    };

    let shutdown = ShutdownSignal::new();
    let reporter = startup::spawn_stats_reporter(
        engine.pipeline().clone(),
        configuration.stats_report_interval(),
        &shutdown,
    );

    info!(
        storage = %engine.store().storage_mode(),
        "Senspire engine running"
    );

    startup::wait_for_signal().await;
    shutdown.shutdown();

    engine.shutdown().await;
    if let Err(e) = reporter.await {
        error!(error = %e, "Statistics reporter ended abnormally");
    }

    info!("Senspire stopped");
    Ok(())
}
