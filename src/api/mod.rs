mod base;
mod consensus;

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    error_handling::HandleErrorLayer, http::StatusCode, response::IntoResponse, routing, Router,
};
use tokio::time::Duration;
use tower::{BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;

pub mod paths;

use crate::error::Result;
use crate::node::ConsensusNode;

/// Build the HTTP API over a running consensus node
pub async fn api(node: Arc<ConsensusNode>) -> Result<Router> {
    // Endpoints
    let api = Router::new()
        .route(paths::base::ROOT, routing::get(base::root))
        .route(paths::base::HEALTH, routing::get(base::health))
        .route(paths::base::ABOUT, routing::get(base::about))
        // Consensus surface
        .route(paths::consensus::PROPOSE, routing::post(consensus::propose))
        .route(paths::consensus::STATE, routing::get(consensus::state))
        .route(paths::consensus::STATE_KEY, routing::get(consensus::state_key))
        .route(paths::consensus::PEERS, routing::get(consensus::peers))
        .route(paths::consensus::STATUS, routing::get(consensus::status))
        .layer(
            ServiceBuilder::new()
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .timeout(Duration::from_secs(10)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(node);

    Ok(api)
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Cow::from("service is overloaded, try again later"),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Cow::from(format!("Unhandled internal error: {}", error)),
    )
}
