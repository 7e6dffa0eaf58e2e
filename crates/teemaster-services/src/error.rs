use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Why a registration, rebind or heartbeat was refused.
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("token is bound to port {registered}, not {requested}")]
    PortMismatch { registered: u16, requested: u16 },

    #[error("address {0} is already registered")]
    AddressClaimed(IpAddr),

    #[error("{0} did not answer the reachability probe")]
    Unreachable(SocketAddr),

    #[error("unknown token")]
    UnknownToken,

    #[error("no live registration for {0}")]
    UnknownServer(SocketAddr),

    #[error("heartbeat too early, retry in {}s", retry_in.as_secs())]
    TooEarly { retry_in: Duration },
}

/// Shared cache failures. Never surfaced to HTTP clients: publish failures
/// are logged, fetch failures drop that key from the listing.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache operation on {0:?} timed out")]
    Timeout(String),

    #[error("no value under {0:?}")]
    Missing(String),

    #[error("failed to encode listing: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode listing under {key:?}: {source}")]
    Decode {
        key: String,
        #[source]
        source: rmp_serde::decode::Error,
    },
}
