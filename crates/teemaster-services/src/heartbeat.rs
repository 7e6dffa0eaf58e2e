//! Heartbeat engine — renews registrations by `(address, port)`.
//!
//! A heartbeat carries no token: the identity is the source address observed
//! on the connection plus the advertised port. Renewal is rate limited: the
//! window for the next heartbeat opens `min_wait` after the previous one was
//! accepted, i.e. at `expire - (interval - min_wait)`.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use teemaster_core::config::HeartbeatConfig;
use teemaster_core::Entry;

use crate::error::MasterError;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPolicy {
    pub interval: Duration,
    pub min_wait: Duration,
}

impl HeartbeatPolicy {
    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self {
            interval: config.interval(),
            min_wait: config.min_wait(),
        }
    }

    /// Expiry granted by a registration or accepted heartbeat at `now`.
    pub fn expire_from(&self, now: Instant) -> Instant {
        now + self.interval
    }

    /// Earliest instant a heartbeat for `entry` is accepted.
    pub fn renewal_opens_at(&self, entry: &Entry) -> Instant {
        let closed_for = self.interval.saturating_sub(self.min_wait);
        entry.expire.checked_sub(closed_for).unwrap_or(entry.expire)
    }

    /// New expiry for `entry`, or `TooEarly` inside the anti-spam window.
    pub fn renew(&self, entry: &Entry, now: Instant) -> Result<Instant, MasterError> {
        let opens_at = self.renewal_opens_at(entry);
        if now < opens_at {
            return Err(MasterError::TooEarly {
                retry_in: opens_at - now,
            });
        }
        Ok(self.expire_from(now))
    }
}

#[derive(Clone)]
pub struct HeartbeatEngine {
    registry: Registry,
    policy: HeartbeatPolicy,
}

impl HeartbeatEngine {
    pub fn new(registry: Registry, policy: HeartbeatPolicy) -> Self {
        Self { registry, policy }
    }

    pub async fn heartbeat(&self, source: IpAddr, port: u16) -> Result<Instant, MasterError> {
        self.heartbeat_at(source, port, Instant::now()).await
    }

    /// Heartbeat as if received at `now`.
    pub async fn heartbeat_at(
        &self,
        source: IpAddr,
        port: u16,
        now: Instant,
    ) -> Result<Instant, MasterError> {
        if port == 0 {
            return Err(MasterError::BadRequest("port must be nonzero".into()));
        }
        let source = teemaster_core::entry::canonical_ip(source);
        let policy = self.policy;

        let result = self
            .registry
            .mutate_expire(source, port, now, |entry| policy.renew(entry, now))
            .await;

        match &result {
            Ok(_) => tracing::debug!(%source, port, "heartbeat accepted"),
            Err(e) => tracing::debug!(%source, port, error = %e, "heartbeat refused"),
        }
        result
    }
}
