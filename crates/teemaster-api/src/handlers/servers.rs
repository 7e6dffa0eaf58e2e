//! `/` handlers — register (POST) and the federated listing (GET).

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use teemaster_core::{ListedServer, Token};

use super::{parse_json, unix_expire, ApiError, ApiState};

// ── GET / ─────────────────────────────────────────────────────────────────────

pub async fn handle_list(State(state): State<ApiState>) -> Json<Vec<ListedServer>> {
    Json(state.federation.federate().await)
}

// ── POST / ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(alias = "Port")]
    pub port: u16,
    /// Token from an earlier registration; present when binding a second
    /// address family to the same entry.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    /// Unix seconds.
    pub expire: u64,
}

pub async fn handle_register(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let req: RegisterRequest = parse_json(&headers, &body)?;
    let token = req
        .token
        .filter(|t| !t.is_empty())
        .map(Token::from_client);

    let registration = state
        .registrar
        .register(peer.ip(), req.port, token)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token: registration.token.to_string(),
            expire: unix_expire(registration.expire),
        }),
    ))
}
