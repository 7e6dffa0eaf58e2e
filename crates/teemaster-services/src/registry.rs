//! Registry store — the only owner of registration entries.
//!
//! One `RwLock` guards the whole map. Reads take the shared lock. Every
//! check-and-mutate (address uniqueness + insert, port check + rebind,
//! renewal window + renew) runs inside a single exclusive section so two
//! concurrent requests can never both pass a check before either mutates.
//! No lock is ever held across a network or socket call.
//!
//! Expired entries are invisible to every read and check. A separate reaper
//! task removes them from memory.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use teemaster_core::{Entry, ListedServer, Token};

use crate::error::MasterError;

#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<HashMap<Token, Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new registration for `addr`.
    ///
    /// Fails with `AddressClaimed` if a live local entry or a peer (as of the
    /// last federation fetch) already claims the address. The token is drawn
    /// and re-drawn under the same lock until it is unused locally.
    pub async fn insert(
        &self,
        addr: IpAddr,
        port: u16,
        expire: Instant,
        peer_claims: &HashSet<IpAddr>,
        now: Instant,
    ) -> Result<Token, MasterError> {
        let mut entries = self.entries.write().await;

        let claimed_locally = entries
            .values()
            .any(|e| e.is_live(now) && e.claims(&addr));
        if claimed_locally || peer_claims.contains(&addr) {
            return Err(MasterError::AddressClaimed(addr));
        }

        let token = loop {
            let candidate = Token::generate();
            if !entries.contains_key(&candidate) {
                break candidate;
            }
        };

        entries.insert(token.clone(), Entry::new(token.clone(), addr, port, expire));
        Ok(token)
    }

    pub async fn lookup(&self, token: &Token, now: Instant) -> Option<Entry> {
        self.entries
            .read()
            .await
            .get(token)
            .filter(|e| e.is_live(now))
            .cloned()
    }

    pub async fn lookup_by_address_port(
        &self,
        addr: IpAddr,
        port: u16,
        now: Instant,
    ) -> Option<Entry> {
        self.entries
            .read()
            .await
            .values()
            .find(|e| e.is_live(now) && e.port == port && e.claims(&addr))
            .cloned()
    }

    /// Bind `addr` into its family slot of the entry behind `token`.
    ///
    /// The token's port is fixed: a different `port` means a different
    /// logical server and is refused without touching the entry. An address
    /// already claimed by another live entry is refused too, since heartbeat
    /// identity is `(address, port)`.
    pub async fn mutate_address(
        &self,
        token: &Token,
        port: u16,
        addr: IpAddr,
        now: Instant,
    ) -> Result<Entry, MasterError> {
        let mut entries = self.entries.write().await;

        match entries.get(token) {
            Some(entry) if entry.is_live(now) => {
                if entry.port != port {
                    return Err(MasterError::PortMismatch {
                        registered: entry.port,
                        requested: port,
                    });
                }
            }
            _ => return Err(MasterError::UnknownToken),
        }

        let claimed_elsewhere = entries
            .values()
            .any(|e| &e.token != token && e.is_live(now) && e.claims(&addr));
        if claimed_elsewhere {
            return Err(MasterError::AddressClaimed(addr));
        }

        let entry = entries.get_mut(token).ok_or(MasterError::UnknownToken)?;
        entry.bind(addr);
        Ok(entry.clone())
    }

    /// Move the expiry of the live entry at `(addr, port)`.
    ///
    /// `decide` sees the current entry and returns the new expiry or a
    /// refusal; it runs under the exclusive lock. Expiry never moves
    /// backwards.
    pub async fn mutate_expire<F>(
        &self,
        addr: IpAddr,
        port: u16,
        now: Instant,
        decide: F,
    ) -> Result<Instant, MasterError>
    where
        F: FnOnce(&Entry) -> Result<Instant, MasterError>,
    {
        let mut entries = self.entries.write().await;

        let entry = entries
            .values_mut()
            .find(|e| e.is_live(now) && e.port == port && e.claims(&addr))
            .ok_or(MasterError::UnknownServer(SocketAddr::new(addr, port)))?;

        let expire = decide(entry)?;
        entry.expire = entry.expire.max(expire);
        Ok(entry.expire)
    }

    /// Live entries in listing form.
    pub async fn snapshot(&self, now: Instant) -> Vec<ListedServer> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .map(Entry::listed)
            .collect()
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn reap(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Remove expired entries on a fixed period.
///
/// Runs forever — cancel by dropping the task handle. `on_reaped` is called
/// after a pass that removed something, so the published snapshot can follow.
pub async fn reap_loop<F>(registry: Registry, period: Duration, on_reaped: F)
where
    F: Fn(usize),
{
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        let removed = registry.reap(Instant::now()).await;
        if removed > 0 {
            tracing::debug!(removed, "reaped expired registrations");
            on_reaped(removed);
        }
    }
}
