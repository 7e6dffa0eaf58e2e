//! Cache federation — publish our listing, merge our peers' listings.
//!
//! `publish` writes the live snapshot under this instance's identifier.
//! `federate` reads that key back plus every configured peer key and
//! concatenates them. A peer that is missing, slow, or unreadable is left out
//! of the result; it never fails the listing. Each instance reports only its
//! own registrants, so there is no deduplication.
//!
//! The peer half of the last `federate` result is kept in a `PeerView`, which
//! registration consults (without any network call) for address uniqueness.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::RwLock;

use teemaster_core::config::FederationConfig;
use teemaster_core::wire::{decode_listing, encode_listing};
use teemaster_core::ListedServer;

use crate::cache::SharedCache;
use crate::error::CacheError;
use crate::registry::Registry;

/// Peer listings as of the last federation fetch.
#[derive(Clone, Default)]
pub struct PeerView {
    servers: Arc<RwLock<Vec<ListedServer>>>,
}

impl PeerView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, servers: Vec<ListedServer>) {
        *self.servers.write().await = servers;
    }

    /// Every address some peer currently lists.
    pub async fn claims(&self) -> HashSet<IpAddr> {
        self.servers
            .read()
            .await
            .iter()
            .flat_map(ListedServer::addresses)
            .collect()
    }
}

#[derive(Clone)]
pub struct Federation {
    cache: SharedCache,
    registry: Registry,
    identifier: Arc<str>,
    peers: Arc<[String]>,
    timeout: Duration,
    peer_view: PeerView,
}

impl Federation {
    pub fn new(cache: SharedCache, registry: Registry, config: &FederationConfig) -> Self {
        Self {
            cache,
            registry,
            identifier: Arc::from(config.server_identifier.as_str()),
            peers: config.peers.clone().into(),
            timeout: config.cache_timeout(),
            peer_view: PeerView::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn peer_view(&self) -> PeerView {
        self.peer_view.clone()
    }

    /// Write the live snapshot under our identifier. Returns how many servers
    /// were published.
    pub async fn publish(&self) -> Result<usize, CacheError> {
        let snapshot = self.registry.snapshot(Instant::now()).await;
        let bytes = encode_listing(&snapshot)?;

        tokio::time::timeout(
            self.timeout,
            self.cache.set(&self.identifier, Bytes::from(bytes)),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.identifier.to_string()))??;

        tracing::debug!(
            key = %self.identifier,
            servers = snapshot.len(),
            "published listing"
        );
        Ok(snapshot.len())
    }

    /// Our published listing followed by every reachable peer's listing.
    ///
    /// If our own key cannot be read (not yet published, cache down) the
    /// local snapshot stands in for it.
    pub async fn federate(&self) -> Vec<ListedServer> {
        let mut servers = match self.fetch(&self.identifier).await {
            Ok(own) => own,
            Err(e) => {
                tracing::warn!(
                    key = %self.identifier,
                    error = %e,
                    "own listing unavailable, serving local snapshot"
                );
                self.registry.snapshot(Instant::now()).await
            }
        };

        let peer_servers = self.fetch_peers().await;
        servers.extend(peer_servers.iter().cloned());
        self.peer_view.replace(peer_servers).await;

        servers
    }

    /// Refresh the peer view without building a full listing.
    pub async fn refresh_peers(&self) -> usize {
        let peer_servers = self.fetch_peers().await;
        let count = peer_servers.len();
        self.peer_view.replace(peer_servers).await;
        count
    }

    async fn fetch_peers(&self) -> Vec<ListedServer> {
        let mut servers = Vec::new();
        for peer in self.peers.iter() {
            match self.fetch(peer).await {
                Ok(listing) => servers.extend(listing),
                Err(e) => tracing::debug!(peer = %peer, error = %e, "skipping peer listing"),
            }
        }
        servers
    }

    async fn fetch(&self, key: &str) -> Result<Vec<ListedServer>, CacheError> {
        let value = tokio::time::timeout(self.timeout, self.cache.get(key))
            .await
            .map_err(|_| CacheError::Timeout(key.to_string()))??
            .ok_or_else(|| CacheError::Missing(key.to_string()))?;

        decode_listing(&value).map_err(|source| CacheError::Decode {
            key: key.to_string(),
            source,
        })
    }
}

/// Republish our snapshot and refresh the peer view on a fixed period, so
/// expiries reach the cache even when nobody registers and admission checks
/// see recent peer listings.
pub async fn refresh_loop(federation: Federation, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        if let Err(e) = federation.publish().await {
            tracing::warn!(error = %e, "periodic republish failed");
        }
        let peers = federation.refresh_peers().await;
        tracing::debug!(peers, "peer view refreshed");
    }
}
