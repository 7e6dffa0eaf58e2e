//! TeeMaster integration test harness.
//!
//! Every test spins up its own in-process master on `127.0.0.1:0` (plus
//! `[::1]:0` when the host has IPv6 loopback) and talks to it over real
//! HTTP. All requests come from loopback, so a master admits exactly one
//! registration per address family; tests needing more start more masters.
//!
//!   cargo test --test integration

mod federation;
mod headers;
mod reachability;
mod registration;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use zerocopy::AsBytes;

use teemaster_api::ApiState;
use teemaster_core::config::{FederationConfig, HeartbeatConfig};
use teemaster_core::wire::ProbePacket;
use teemaster_services::{
    publish_loop, Federation, HeartbeatEngine, HeartbeatPolicy, MemoryCache, Publisher,
    ReachabilityChecker, Registrar, Registry, SharedCache,
};

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct MasterOptions {
    pub identifier: &'static str,
    pub peers: Vec<String>,
    pub interval_secs: u64,
    pub min_wait_secs: u64,
    /// Probe timeout when the reachability gate is on.
    pub gate: Option<Duration>,
}

impl Default for MasterOptions {
    fn default() -> Self {
        Self {
            identifier: "Master",
            peers: Vec::new(),
            interval_secs: 90,
            min_wait_secs: 70,
            gate: None,
        }
    }
}

pub struct Master {
    /// `http://127.0.0.1:<port>`
    pub base: String,
    /// `http://[::1]:<port>` when IPv6 loopback is available.
    pub base6: Option<String>,
    pub registry: Registry,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Master {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Start a master publishing into `cache`.
pub async fn spawn_master(cache: &MemoryCache, options: MasterOptions) -> Result<Master> {
    let federation_config = FederationConfig {
        server_identifier: options.identifier.to_string(),
        peers: options.peers,
        publish_debounce_millis: 10,
        ..FederationConfig::default()
    };
    let policy = HeartbeatPolicy::from_config(&HeartbeatConfig {
        interval_secs: options.interval_secs,
        min_wait_secs: options.min_wait_secs,
    });

    let registry = Registry::new();
    let federation = Federation::new(
        SharedCache::Memory(cache.clone()),
        registry.clone(),
        &federation_config,
    );
    let (publisher, publish_rx) = Publisher::channel();

    let mut registrar = Registrar::new(registry.clone(), federation.peer_view(), publisher, policy);
    if let Some(timeout) = options.gate {
        registrar = registrar.with_reachability_gate(ReachabilityChecker::new(timeout));
    }

    let state = ApiState {
        registrar,
        heartbeat: HeartbeatEngine::new(registry.clone(), policy),
        federation: federation.clone(),
    };

    let mut tasks = vec![tokio::spawn(publish_loop(
        publish_rx,
        federation,
        federation_config.publish_debounce(),
    ))];

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind IPv4 listener")?;
    let base = format!("http://{}", listener.local_addr()?);
    tasks.push(serve(state.clone(), listener));

    let base6 = match TcpListener::bind("[::1]:0").await {
        Ok(listener) => {
            let base6 = format!("http://{}", listener.local_addr()?);
            tasks.push(serve(state, listener));
            Some(base6)
        }
        Err(_) => None,
    };

    Ok(Master {
        base,
        base6,
        registry,
        tasks,
    })
}

fn serve(state: ApiState, listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = teemaster_api::serve_on(state, listener).await {
            eprintln!("test master stopped: {e}");
        }
    })
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

pub async fn post_json(url: &str, body: &Value) -> Result<reqwest::Response> {
    reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url} failed"))
}

pub async fn post_raw(url: &str, content_type: &str, body: &'static str) -> Result<reqwest::Response> {
    reqwest::Client::new()
        .post(url)
        .header("Content-Type", content_type)
        .body(body)
        .send()
        .await
        .with_context(|| format!("POST {url} failed"))
}

pub async fn get(url: &str) -> Result<reqwest::Response> {
    reqwest::get(url)
        .await
        .with_context(|| format!("GET {url} failed"))
}

pub async fn json(resp: reqwest::Response) -> Result<Value> {
    resp.json::<Value>().await.context("response is not JSON")
}

/// Register `port` from loopback; returns the issued token.
pub async fn register(base: &str, port: u16) -> Result<String> {
    let resp = post_json(&format!("{base}/"), &serde_json::json!({ "port": port })).await?;
    if resp.status() != 201 {
        bail!("registration failed with {}", resp.status());
    }
    let body = json(resp).await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("response has no token")
}

/// Poll `check` until it holds, for up to two seconds.
pub async fn eventually<F, Fut>(mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for _ in 0..100 {
        if check().await? {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("condition not met within 2s")
}

// ── Fake game server ──────────────────────────────────────────────────────────

/// A UDP socket on loopback that answers reachability challenges when
/// `answer` is set and ignores them otherwise. Returns its port.
pub async fn spawn_game_server(answer: bool) -> Result<(u16, JoinHandle<()>)> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let port = socket.local_addr()?.port();

    let task = tokio::spawn(async move {
        let mut buf = [0u8; 64];
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            if answer && ProbePacket::matches(&buf[..len], &ProbePacket::challenge()) {
                let _ = socket
                    .send_to(ProbePacket::response().as_bytes(), from)
                    .await;
            }
        }
    });

    Ok((port, task))
}
