pub mod handlers;

use std::net::SocketAddr;

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

pub use handlers::ApiState;

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = concat!("TeeMaster/", env!("CARGO_PKG_VERSION"));

/// Header pairs stamped on every response, errors and fallbacks included.
const RESPONSE_HEADERS: [(HeaderName, &str); 5] = [
    (header::CONTENT_TYPE, "application/json"),
    (header::SERVER, SERVER_NAME),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
];

pub fn router(state: ApiState) -> Router {
    let mut app = Router::new()
        .route(
            "/",
            get(handlers::handle_list).post(handlers::handle_register),
        )
        .route("/heartbeat", post(handlers::handle_heartbeat))
        .fallback(handlers::handle_not_found)
        .with_state(state);

    for (name, value) in RESPONSE_HEADERS {
        app = app.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }
    app
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(state: ApiState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API listening");
    serve_on(state, listener).await
}

/// Serve on an already-bound listener (tests bind `127.0.0.1:0` first).
pub async fn serve_on(state: ApiState, listener: TcpListener) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}
