//! Tasklane server entry point
//!
//! Loads configuration from the environment, installs the tracing
//! subscriber, and serves the API router.

use std::sync::Arc;

use tasklane_server::{app, Config, Services};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    if let Err(err) = config.validate() {
        tracing::error!("invalid configuration: {err}");
        std::process::exit(1);
    }

    let bind_addr = config.bind_addr.clone();
    let services = Arc::new(Services::new(config));
    let router = app(services);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %bind_addr, "failed to bind: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %bind_addr, "tasklane server listening");

    if let Err(err) = axum::serve(listener, router).await {
        tracing::error!("server error: {err}");
    }
}
