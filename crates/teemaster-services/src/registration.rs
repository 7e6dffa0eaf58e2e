//! Registration protocol — new registrations and token rebinds.
//!
//! Without a token, the source address is checked for uniqueness against our
//! live entries and the peer view, and a new entry is admitted, all in one
//! exclusive registry section. With a token, the caller's address is bound
//! into the matching family slot of the existing entry (e.g. the IPv6 leg of
//! a dual-stack server registering a second time).
//!
//! Both paths request a debounced publish once the registry lock is released.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use teemaster_core::entry::canonical_ip;
use teemaster_core::{AddressFamily, Token};

use crate::error::MasterError;
use crate::federation::PeerView;
use crate::heartbeat::HeartbeatPolicy;
use crate::publisher::Publisher;
use crate::reachability::ReachabilityChecker;
use crate::registry::Registry;

/// Outcome of an accepted registration or rebind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub token: Token,
    pub expire: Instant,
}

#[derive(Clone)]
pub struct Registrar {
    registry: Registry,
    peers: PeerView,
    publisher: Publisher,
    policy: HeartbeatPolicy,
    gate: Option<ReachabilityChecker>,
}

impl Registrar {
    pub fn new(
        registry: Registry,
        peers: PeerView,
        publisher: Publisher,
        policy: HeartbeatPolicy,
    ) -> Self {
        Self {
            registry,
            peers,
            publisher,
            policy,
            gate: None,
        }
    }

    /// Probe every new registration before admitting it.
    pub fn with_reachability_gate(mut self, checker: ReachabilityChecker) -> Self {
        self.gate = Some(checker);
        self
    }

    pub async fn register(
        &self,
        source: IpAddr,
        port: u16,
        token: Option<Token>,
    ) -> Result<Registration, MasterError> {
        self.register_at(source, port, token, Instant::now()).await
    }

    /// Register as if received at `now`.
    pub async fn register_at(
        &self,
        source: IpAddr,
        port: u16,
        token: Option<Token>,
        now: Instant,
    ) -> Result<Registration, MasterError> {
        if port == 0 {
            return Err(MasterError::BadRequest("port must be nonzero".into()));
        }
        let source = canonical_ip(source);

        let registration = match token {
            None => self.admit(source, port, now).await?,
            Some(token) => self.rebind(token, source, port, now).await?,
        };

        self.publisher.request();
        Ok(registration)
    }

    async fn admit(
        &self,
        source: IpAddr,
        port: u16,
        now: Instant,
    ) -> Result<Registration, MasterError> {
        if let Some(checker) = &self.gate {
            let target = SocketAddr::new(source, port);
            if !checker.check(target).await {
                return Err(MasterError::Unreachable(target));
            }
        }

        let peer_claims = self.peers.claims().await;
        let expire = self.policy.expire_from(now);
        let token = self
            .registry
            .insert(source, port, expire, &peer_claims, now)
            .await?;

        tracing::info!(%source, port, "server registered");
        Ok(Registration { token, expire })
    }

    async fn rebind(
        &self,
        token: Token,
        source: IpAddr,
        port: u16,
        now: Instant,
    ) -> Result<Registration, MasterError> {
        let entry = self
            .registry
            .mutate_address(&token, port, source, now)
            .await?;

        tracing::info!(
            %source,
            port,
            family = ?AddressFamily::of(&source),
            dual_stack = entry.address4.is_some() && entry.address6.is_some(),
            "server address bound"
        );
        Ok(Registration {
            token,
            expire: entry.expire,
        })
    }
}
