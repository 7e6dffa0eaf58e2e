//! Registration records.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Instant;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Random bytes behind a token.
pub const TOKEN_BYTES: usize = 16;

/// Opaque registration token: 128 random bits, lowercase hex.
///
/// Issued by the registry. Clients present it back to bind a second address
/// family to an existing registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Draw a fresh token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a token presented by a client. Not validated: an unknown or
    /// malformed token simply fails lookup.
    pub fn from_client(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// Fold IPv4-mapped IPv6 (`::ffff:a.b.c.d`) back to IPv4.
///
/// Dual-stack listeners report IPv4 clients this way; without folding, the
/// same host would register under two different "families".
pub fn canonical_ip(addr: IpAddr) -> IpAddr {
    addr.to_canonical()
}

/// One claimed registration, as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub token: Token,
    pub address4: Option<Ipv4Addr>,
    pub address6: Option<Ipv6Addr>,
    /// Fixed at creation.
    pub port: u16,
    pub expire: Instant,
}

impl Entry {
    /// New entry bound to `addr` on its family.
    pub fn new(token: Token, addr: IpAddr, port: u16, expire: Instant) -> Self {
        let mut entry = Self {
            token,
            address4: None,
            address6: None,
            port,
            expire,
        };
        entry.bind(addr);
        entry
    }

    /// Set the address slot for `addr`'s family, leaving the other untouched.
    pub fn bind(&mut self, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => self.address4 = Some(v4),
            IpAddr::V6(v6) => self.address6 = Some(v6),
        }
    }

    pub fn is_live(&self, now: Instant) -> bool {
        now < self.expire
    }

    pub fn claims(&self, addr: &IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.address4.as_ref() == Some(v4),
            IpAddr::V6(v6) => self.address6.as_ref() == Some(v6),
        }
    }

    pub fn listed(&self) -> ListedServer {
        ListedServer {
            address4: self.address4,
            address6: self.address6,
            port: self.port,
        }
    }
}

/// Public form of an entry: what `GET /` returns and what peers publish.
/// Token and expiry never leave the owning instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedServer {
    pub address4: Option<Ipv4Addr>,
    pub address6: Option<Ipv6Addr>,
    pub port: u16,
}

impl ListedServer {
    /// Every address this server claims.
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.address4
            .map(IpAddr::V4)
            .into_iter()
            .chain(self.address6.map(IpAddr::V6))
    }
}
