//! HTTP API handlers — registration, heartbeat and the federated listing.

pub mod heartbeat;
pub mod servers;

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

use teemaster_services::{Federation, HeartbeatEngine, MasterError, Registrar};

#[derive(Clone)]
pub struct ApiState {
    pub registrar: Registrar,
    pub heartbeat: HeartbeatEngine,
    pub federation: Federation,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("expected Content-Type: application/json")]
    UnsupportedMediaType,

    #[error("malformed body: {0}")]
    Malformed(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Master(#[from] MasterError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Master(e) => match e {
                MasterError::BadRequest(_) | MasterError::PortMismatch { .. } => {
                    StatusCode::BAD_REQUEST
                }
                MasterError::AddressClaimed(_) => StatusCode::CONFLICT,
                MasterError::Unreachable(_) | MasterError::TooEarly { .. } => {
                    StatusCode::FORBIDDEN
                }
                MasterError::UnknownToken | MasterError::UnknownServer(_) => {
                    StatusCode::NOT_FOUND
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(%status, error = %self, "request refused");

        let retry_after = match &self {
            // Round up so a client that waits exactly this long is accepted.
            ApiError::Master(MasterError::TooEarly { retry_in }) => Some(
                retry_in.as_secs() + u64::from(retry_in.subsec_nanos() > 0),
            ),
            _ => None,
        };

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// `true` for `application/json`, with or without parameters.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Check the content type, then decode the body.
fn parse_json<T: DeserializeOwned>(headers: &HeaderMap, body: &[u8]) -> Result<T, ApiError> {
    if !is_json(headers) {
        return Err(ApiError::UnsupportedMediaType);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Wall-clock seconds since the epoch at which `expire` falls.
fn unix_expire(expire: Instant) -> u64 {
    let remaining = expire.saturating_duration_since(Instant::now());
    (SystemTime::now() + remaining)
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn handle_not_found() -> ApiError {
    ApiError::NotFound
}

// Re-export handler functions for use in router setup.
pub use heartbeat::handle_heartbeat;
pub use servers::{handle_list, handle_register};
