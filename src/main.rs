use std::sync::Arc;

use marketplace_mcp::{
    build_app,
    config::{Config, Transport},
    credentials::{CredentialStore, DEFAULT_API_URL},
    logging,
    marketplace::client::{Connection, MarketplaceClient},
    mcp::stdio::serve_stdio,
    AppState,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let credentials = Arc::new(CredentialStore::discover(config.up_config_path.clone()));

    let connection = match credentials.load_connection() {
        Ok(connection) => {
            info!(
                config_path = %credentials.config_path().display(),
                base_url = %connection.base_url,
                "loaded UP CLI credentials"
            );
            connection
        }
        Err(err) => {
            warn!(
                error = %err,
                "UP CLI credentials unavailable, continuing unauthenticated"
            );
            Connection::new(DEFAULT_API_URL, None)?
        }
    };

    let marketplace = Arc::new(MarketplaceClient::new(connection)?);
    let state = AppState::new(config.api_token.clone(), marketplace, credentials);

    match config.transport {
        Transport::Stdio => serve_stdio(state).await?,
        Transport::Http => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                auth = config.api_token.is_some(),
                "server starting"
            );

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
