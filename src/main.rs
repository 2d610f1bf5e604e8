use std::{net::SocketAddr, sync::Arc};

use anistream::{
    common::{banner::{BuildInfo, print_banner}, logger, types::AnyResult},
    configs::Config,
    server::AppState,
    transport,
};
use tracing::info;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config);
    print_banner(&BuildInfo::default(), &config);

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shared_state = Arc::new(AppState::new(&config)?);
    let app = transport::http_server::router(shared_state);

    info!("anistream listening on {}", address);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
