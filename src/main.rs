use std::sync::Arc;

use tokio::sync::watch;

use claimwatch::api::router::create_router;
use claimwatch::chain::{MarketApiClient, RpcClient};
use claimwatch::config::AppConfig;
use claimwatch::services::market_cache::MarketCache;
use claimwatch::services::monitor::Monitor;
use claimwatch::services::notifier::Notifier;
use claimwatch::services::state_store::StateStore;
use claimwatch::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let metrics_handle = claimwatch::metrics::init_metrics()?;

    let store = StateStore::open(&config.state_file)?;
    let persistence_ok = store.health_flag();

    let http = reqwest::Client::new();
    let sinks = config.sinks();
    tracing::info!(sinks = sinks.len(), "Notifier configured");
    let notifier = Arc::new(Notifier::new(http.clone(), sinks));

    let rpc = RpcClient::new(http.clone(), config.rpc_url.clone(), config.program_id.clone());
    let mut cache = MarketCache::new(
        MarketApiClient::new(http.clone(), config.markets_api_url.clone()),
        config.market_cache_ttl(),
    );

    // --- Warm-up: market snapshot and RPC probe in parallel ---
    let (markets, slot) = tokio::join!(cache.refresh(), rpc.get_slot());
    match markets {
        Ok(count) => tracing::info!(markets = count, "Market snapshot warmed"),
        Err(e) => tracing::warn!(error = %e, "Initial market fetch failed, will retry on first cycle"),
    }
    match slot {
        Ok(slot) => tracing::info!(slot, rpc = %config.rpc_url, "RPC reachable"),
        Err(e) => tracing::warn!(error = %e, rpc = %config.rpc_url, "RPC probe failed"),
    }

    // --- Health / metrics server ---
    let state = AppState {
        metrics_handle,
        notifier: Arc::clone(&notifier),
        persistence_ok,
    };
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health server listening on {addr}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, create_router(state)).await {
            tracing::error!(error = %e, "Health server stopped");
        }
    });

    // --- Shutdown signal ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received, finishing current account");
        let _ = shutdown_tx.send(true);
    });

    let mut monitor = Monitor::new(config.monitor_config(), cache, rpc, store, notifier);
    monitor.run(shutdown_rx).await;

    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
