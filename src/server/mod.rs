//! Local query endpoint, so a separate UI surface can poll the clock state
//! without running its own resolution.

mod handlers;
mod state;

use axum::routing::{get, post};
use axum::Router;
use log::info;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::controller::Controller;
use crate::error::GeoclockError;

pub fn build_router(controller: Arc<Controller>) -> Router {
    let state = Arc::new(AppState { controller });

    Router::new()
        .route("/api/state", get(handlers::get_state))
        .route("/api/message", post(handlers::message))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, controller: Arc<Controller>, shutdown: F) -> Result<(), GeoclockError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(controller);
    let listener = TcpListener::bind(addr).await?;
    info!("query endpoint listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
