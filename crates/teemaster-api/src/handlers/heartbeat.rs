//! `/heartbeat` handler. The entry is found by request source address and
//! body port; no token is involved.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{parse_json, unix_expire, ApiError, ApiState};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatRequest {
    #[serde(alias = "Port")]
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    /// Unix seconds.
    pub expire: u64,
}

pub async fn handle_heartbeat(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let req: HeartbeatRequest = parse_json(&headers, &body)?;
    let expire = state.heartbeat.heartbeat(peer.ip(), req.port).await?;
    Ok(Json(HeartbeatResponse {
        expire: unix_expire(expire),
    }))
}
