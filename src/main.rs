use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use analytics_collector::clock::{Clock, SystemClock};
use analytics_collector::collect::AnalyticsService;
use analytics_collector::config::Config;
use analytics_collector::handlers::{VisitorMetrics, build_pathways};
use analytics_collector::logging;
use analytics_collector::pathways::FlowcoreWebhookClient;
use analytics_collector::privacy::SaltClock;
use analytics_collector::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env().context("failed to load configuration")?;

    let writer = FlowcoreWebhookClient::new(&config.flowcore)
        .context("failed to build event log client")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(VisitorMetrics::new());

    let pathways = build_pathways(config.transformer_secret, metrics.clone(), clock.clone())
        .context("failed to register pathways")?;
    for flow in pathways.registered_flows() {
        info!(flow = %flow, "Pathway registered");
    }

    let salt_clock = SaltClock::new(config.secret_key);
    let analytics = AnalyticsService::new(salt_clock, writer, clock.clone());
    let app = build_router(AppState::new(analytics, pathways, metrics, clock));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        %addr,
        tenant = %config.flowcore.tenant,
        data_core = %config.flowcore.data_core,
        "listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
