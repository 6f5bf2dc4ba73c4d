use dotenvy::dotenv;
use portal_core::observability::init_tracing;
use reclaim_portal::config::get_configuration;
use reclaim_portal::services::authenticator::Authenticator;
use reclaim_portal::services::cloud::{create_signer, CloudTransport, Endpoints};
use reclaim_portal::services::deleter::Deleter;
use reclaim_portal::services::search::{filter, Search};
use reclaim_portal::startup::build_router;
use reclaim_portal::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let settings = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("reclaim-portal", &settings.logging)?;
    reclaim_portal::services::metrics::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.cloud.request_timeout_seconds))
        .build()?;

    let endpoints = Endpoints::from_override(settings.cloud.endpoint_override.as_deref());
    let credentials = create_signer(&settings.cloud, &http, &endpoints)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create cloud signer: {}", e))?;
    info!(tenancy = %credentials.tenancy, region = %credentials.region, "Cloud credentials ready");

    let transport = CloudTransport::new(http.clone(), credentials.signer.clone(), endpoints);

    let search = Search::initialize(&settings.ownership, &credentials, &transport)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize search: {}", e))?
        .with_filter(filter::from_settings(&settings.filter, &settings.ownership));

    let deleter = Deleter::new(&transport, search.regions())
        .map_err(|e| anyhow::anyhow!("Failed to initialize deleter: {}", e))?;

    let authenticator =
        Authenticator::discover(&settings.oidc, settings.server.callback_url(), http)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to discover OIDC provider: {}", e))?;

    let state = AppState::new(
        Arc::new(authenticator),
        Arc::new(search),
        Arc::new(deleter),
        &settings.server,
    );
    let app = build_router(state, &settings.server);

    let address = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting reclaim-portal on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
