//! teemasterd — TeeMaster game master server.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;

use teemaster_api::ApiState;
use teemaster_core::MasterConfig;
use teemaster_services::{
    publish_loop, reap_loop, refresh_loop, Federation, HeartbeatEngine, HeartbeatPolicy,
    Publisher, ReachabilityChecker, Registrar, Registry, SharedCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    match MasterConfig::write_default_if_missing() {
        Ok(path) => tracing::debug!(path = %path.display(), "config file"),
        Err(e) => tracing::warn!(error = %e, "failed to write default config"),
    }
    let config = Arc::new(MasterConfig::load().context("invalid configuration")?);

    tracing::info!(
        identifier = %config.federation.server_identifier,
        peers = config.federation.peers.len(),
        interval_secs = config.heartbeat.interval_secs,
        min_wait_secs = config.heartbeat.min_wait_secs,
        "teemasterd starting"
    );

    // ── Shared state ─────────────────────────────────────────────────────────

    let cache = SharedCache::connect(&config.federation.cache_url)
        .await
        .context("failed to connect to shared cache")?;
    tracing::info!(backend = cache.backend(), "shared cache ready");

    let registry = Registry::new();
    let federation = Federation::new(cache, registry.clone(), &config.federation);
    let policy = HeartbeatPolicy::from_config(&config.heartbeat);
    let (publisher, publish_rx) = Publisher::channel();

    let mut registrar = Registrar::new(
        registry.clone(),
        federation.peer_view(),
        publisher.clone(),
        policy,
    );
    if config.probe.gate_registration {
        registrar =
            registrar.with_reachability_gate(ReachabilityChecker::from_config(&config.probe));
        tracing::info!(
            timeout_secs = config.probe.socket_timeout_secs,
            "reachability gate enabled"
        );
    }

    // An empty listing under our key beats a stale one from a previous run.
    if let Err(e) = federation.publish().await {
        tracing::warn!(error = %e, "initial publish failed");
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let publisher_task = tokio::spawn(publish_loop(
        publish_rx,
        federation.clone(),
        config.federation.publish_debounce(),
    ));

    let reaper_task = {
        let registry = registry.clone();
        let publisher = publisher.clone();
        spawn_periodic(config.registry.reap_interval_secs, move |period| {
            reap_loop(registry, period, move |_| publisher.request())
        })
    };

    let refresh_task = {
        let federation = federation.clone();
        spawn_periodic(config.federation.refresh_interval_secs, move |period| {
            refresh_loop(federation, period)
        })
    };

    let bind: IpAddr = config
        .http
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.http.bind))?;
    let addr = SocketAddr::new(bind, config.http.port);

    let state = ApiState {
        registrar,
        heartbeat: HeartbeatEngine::new(registry, policy),
        federation,
    };
    let api_task = tokio::spawn(async move {
        if let Err(e) = teemaster_api::serve(state, addr).await {
            tracing::error!(error = %e, "API server failed");
        }
    });

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
        r = api_task       => tracing::error!("API task exited: {:?}", r),
        r = publisher_task => tracing::error!("publisher exited: {:?}", r),
        r = reaper_task    => tracing::error!("reaper exited: {:?}", r),
        r = refresh_task   => tracing::error!("refresh task exited: {:?}", r),
    }

    Ok(())
}

/// Spawn a periodic loop, or a task that never finishes when `secs` is 0.
fn spawn_periodic<F, Fut>(secs: u64, run: F) -> JoinHandle<()>
where
    F: FnOnce(Duration) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    if secs == 0 {
        return tokio::spawn(std::future::pending());
    }
    tokio::spawn(run(Duration::from_secs(secs)))
}
