use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;

use scanfleet_infra::SimulatorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimulatorConfig::from_env().context("invalid configuration")?;
    scanfleet_observability::init(config.log_format);

    tracing::info!(
        mode = %config.mode,
        api = %config.api_url,
        robots = config.robots_count,
        update_interval = ?config.update_interval,
        status_interval = ?config.status_interval,
        "starting emulator"
    );

    let services = scanfleet_emulator::connect(&config)?;
    let mut rng = StdRng::from_entropy();
    let fleet = scanfleet_emulator::launch(&config, services, &mut rng).await?;

    shutdown_signal().await;
    fleet.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown requested");
}
