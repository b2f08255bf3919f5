pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::{AppState, CredentialStatus};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::chat::router())
        .merge(routes::schedule::router())
        .merge(routes::content::router())
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
