use std::{sync::Arc, time::Duration};

use axum::Server;
use common::config::Config;
use store::Store;
use tracing::{error, info, instrument, warn};

/// Open persisted state and serve HTTP requests until interrupted.
#[instrument(skip_all, err)]
pub(crate) async fn serve(config: Config) -> Result<(), anyhow::Error> {
    let Some(server_config) = config.server.as_ref() else {
        return Err(anyhow::Error::msg("unable to load server config"));
    };

    let address = server_config.address;
    let config = Arc::new(config);

    info!("opening update server state");
    let store = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Store::open(&config)).await??
    };
    let store = Arc::new(store);

    if store.tenants.is_empty() {
        warn!("no tenants registered, every update check will be rejected");
    }

    if config.updates.admin_key.is_empty() {
        warn!("admin key is empty, management routes are disabled");
    }

    let reaper = store
        .tokens
        .spawn_reaper(Duration::from_secs(config.updates.reaper_interval.max(1)));

    info!(
        %address,
        environment = %config.updates.environment,
        installers = %store.artifacts.dir().display(),
        token_ttl = store.tokens.ttl().whole_seconds(),
        "serving update requests"
    );

    let result = Server::bind(&address)
        .serve(crate::app_router(store, config).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    reaper.abort();

    Ok(result?)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(error) => {
            error!(%error, "unable to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}
