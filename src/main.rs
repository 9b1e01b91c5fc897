use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay::config::RelayConfig;
use relay::engine::bollard_client::BollardEngineClient;
use relay::registry::HttpRegistryClient;
use relay::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "relay=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting relay");

    relay::metrics::register_metrics();

    let config = RelayConfig::from_env();
    let engine = BollardEngineClient::connect(config.engine_host.as_deref(), config.engine_timeout())?;
    let registry = HttpRegistryClient::new(config.engine_timeout());
    let orchestrator = Orchestrator::new(&engine, &registry, &config);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    if config.check_on_startup {
        info!("running startup cycle");
        orchestrator.run_cycle(&shutdown).await;
    }

    let mut interval = tokio::time::interval(config.check_interval());
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("relay shutting down");
                break;
            }
            _ = interval.tick() => {
                if shutdown.is_cancelled() {
                    break;
                }
                orchestrator.run_cycle(&shutdown).await;
            }
        }
    }

    warn!("relay stopped");
    Ok(())
}
