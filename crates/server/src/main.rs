//! # Update distribution server
//!
//! HTTP service that tells desktop clients whether a newer release exists
//! and hands out single-use download tokens for the matching installer.
//!
//! # Routes
//!
//! Client routes live under `/api/updates` and are authenticated with
//! per-tenant `email` and `secret-key` headers, except for the download
//! route, which is authorized by its token alone.
//!
//! Management routes live under `/api/admin` and require the `admin-key`
//! header matching the configured admin key.
//!
//! `/health` is public and reports process uptime and memory usage.

/// Tenant and admin authentication middleware.
mod auth;

/// CLI configuration and available subcommands.
mod cli;

/// Subcommand implementations.
mod commands;

/// HTTP route handlers.
mod handlers;

/// JSON request validation.
mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
use clap::Parser;
use cli::{Cli, Command};
use common::{config::Config, logging};
use store::Store;

/// Update server entrypoint.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = Config::new(cli.config)?;

            logging::init(&config);

            commands::serve(config).await?
        }
        Command::Checksum { path } => commands::checksum(&path)?,
    }

    Ok(())
}

/// Build the application router on top of the shared state.
pub(crate) fn app_router(store: Arc<Store>, config: Arc<Config>) -> Router {
    let admin_routes = handlers::admin::routes().route_layer(from_fn_with_state(
        config.clone(),
        auth::require_admin,
    ));

    let api_routes = Router::new()
        .nest("/updates", handlers::updates::routes(store.clone()))
        .nest("/admin", admin_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health))
        .layer(Extension(handlers::health::Uptime::start()))
        .layer(Extension(config))
        .with_state(store)
}
