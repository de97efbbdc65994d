//! Boxoffice settlement HTTP server.

use boxoffice::clock::SystemClock;
use boxoffice::config::Config;
use boxoffice::notifications::{LogNotifier, SharedNotifier};
use boxoffice::providers::{
    MockProvider, PayPalProvider, ProviderRegistry, SquareProvider, StripeProvider,
};
use boxoffice::server::{build_router, AppState};
use boxoffice::store::{PostgresStore, SharedStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxoffice=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting boxoffice settlement server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        tax_rate_bps = config.settlement.tax_rate_bps,
        mock_provider = config.settlement.enable_mock_provider,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let store = PostgresStore::connect(&config.database).await?;
    store.init_schema().await?;
    let store: SharedStore = Arc::new(store);
    info!("Database ready");

    let clock = Arc::new(SystemClock);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.settlement.provider_timeout_secs))
        .build()?;

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(StripeProvider::new(
        config.stripe.clone(),
        client.clone(),
        clock.clone(),
    )));
    registry.register(Arc::new(PayPalProvider::new(
        config.paypal.clone(),
        client.clone(),
    )));
    registry.register(Arc::new(SquareProvider::new(
        config.square.clone(),
        client,
    )));
    if config.settlement.enable_mock_provider {
        warn!("Mock payment provider enabled; do not use in production");
        registry.register(Arc::new(MockProvider::new(
            config.settlement.mock_webhook_secret.clone(),
        )));
    }
    info!(providers = ?registry.names(), "Payment providers registered");

    let notifier: SharedNotifier = Arc::new(LogNotifier);
    let state = AppState::build(
        &config.settlement,
        store,
        Arc::new(registry),
        notifier,
        clock,
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
