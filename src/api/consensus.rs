//! HTTP handlers for the consensus surface

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::consensus::PeerContact;
use crate::error::KvoraError;
use crate::node::{ConsensusNode, NodeStatus};

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    /// Omitted key means the value stands for itself.
    pub key: Option<String>,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct ProposeResponse {
    pub proposal_id: String,
    pub key: String,
}

#[instrument(skip(state, request), level = "debug")]
pub async fn propose(
    State(state): State<Arc<ConsensusNode>>,
    axum::Json(request): axum::Json<ProposeRequest>,
) -> Result<impl IntoResponse, KvoraError> {
    let key = request
        .key
        .unwrap_or_else(|| crate::consensus::value_key(&request.value));

    match state.propose(key.clone(), request.value).await? {
        Some(proposal_id) => Ok((
            StatusCode::ACCEPTED,
            axum::Json(ProposeResponse { proposal_id, key }),
        )),
        None => Err(KvoraError::Consensus(format!(
            "'{}' is already committed",
            key
        ))),
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn state(
    State(state): State<Arc<ConsensusNode>>,
) -> Result<axum::Json<HashMap<String, Value>>, KvoraError> {
    Ok(axum::Json(state.committed_snapshot()?))
}

#[instrument(skip(state), level = "debug")]
pub async fn state_key(
    Path(key): Path<String>,
    State(state): State<Arc<ConsensusNode>>,
) -> Result<axum::Json<Value>, StatusCode> {
    let snapshot = state
        .committed_snapshot()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    match snapshot.get(&key) {
        Some(value) => Ok(axum::Json(value.clone())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

#[instrument(skip(state), level = "debug")]
pub async fn peers(
    State(state): State<Arc<ConsensusNode>>,
) -> Result<axum::Json<Vec<PeerContact>>, KvoraError> {
    Ok(axum::Json(state.peers()?))
}

#[instrument(skip(state), level = "debug")]
pub async fn status(
    State(state): State<Arc<ConsensusNode>>,
) -> Result<axum::Json<NodeStatus>, KvoraError> {
    Ok(axum::Json(state.status()?))
}
