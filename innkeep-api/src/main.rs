use anyhow::Context;
use innkeep_api::{app, AppState, AutoApprovalWorker};
use innkeep_approval::ApprovalService;
use innkeep_core::flags::HookedEvaluator;
use innkeep_store::{app_config::Config, FliptClient, HotelServiceClient, Telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innkeep_api=debug,innkeep_approval=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Innkeep admin service on port {}", config.server.port);
    tracing::info!(
        flags_url = %config.flags.url,
        namespace = %config.flags.namespace,
        environment = %config.flags.environment,
        hotel_service_url = %config.hotel_service.url,
        "Collaborators"
    );

    let telemetry = Arc::new(
        Telemetry::new(&config.flags.environment, &config.flags.namespace)
            .context("Failed to register metrics")?,
    );

    let flipt = FliptClient::new(&config.flags).context("Failed to build flag client")?;
    let flags = Arc::new(HookedEvaluator::new(Arc::new(flipt)).with_hook(telemetry.clone()));

    let hotel_service = Arc::new(
        HotelServiceClient::new(&config.hotel_service).context("Failed to build hotel service client")?,
    );

    let approvals = Arc::new(ApprovalService::new(
        hotel_service.clone(),
        hotel_service,
        flags,
        telemetry.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = if config.worker.enabled {
        let worker = AutoApprovalWorker::new(
            approvals.clone(),
            config.worker.poll_interval(),
            config.worker.shutdown_grace(),
        );
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        tracing::info!("Auto-approval worker disabled by configuration");
        None
    };

    let app = app(AppState {
        approvals,
        telemetry,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("Server error")?;

    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            tracing::error!("Auto-approval worker panicked: {}", e);
        }
    }

    tracing::info!("Server exited");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, after telling the worker to stop.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);
}
