//! Reachability checker — UDP challenge/response against a claimed address.
//!
//! Catches servers that register from behind a NAT or firewall which drops
//! unsolicited inbound traffic: the HTTP registration succeeds (outbound),
//! but nobody can actually join.
//!
//! Exchange (8-byte datagrams, see `teemaster_core::wire::ProbePacket`):
//!
//! ```text
//!   master → server   FF FF FF FF "fw??"
//!   server → master   FF FF FF FF "fw!!"       within socket_timeout
//!   master → server   FF FF FF FF "fwok"       reply matched
//!                     FF FF FF FF "fwer"       timeout, error, or anything else
//! ```
//!
//! "Unreachable" is an ordinary outcome, not an error. The check is bounded
//! by the socket timeout and must never run under the registry lock.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use zerocopy::AsBytes;

use teemaster_core::config::ProbeConfig;
use teemaster_core::wire::ProbePacket;

/// Largest datagram we bother reading. Anything over 8 bytes is a mismatch
/// anyway; the extra room lets us tell "too long" from "exactly 8".
const RECV_BUF: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ReachabilityChecker {
    socket_timeout: Duration,
}

impl ReachabilityChecker {
    pub fn new(socket_timeout: Duration) -> Self {
        Self { socket_timeout }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.socket_timeout())
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    /// Probe `target`. `true` only if it answered the challenge with the
    /// exact response inside the timeout.
    pub async fn check(&self, target: SocketAddr) -> bool {
        let socket = match bind_for(target).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(%target, error = %e, "failed to open probe socket");
                return false;
            }
        };

        if let Err(e) = socket.send(ProbePacket::challenge().as_bytes()).await {
            tracing::debug!(%target, error = %e, "probe challenge not sent");
            send_verdict(&socket, target, false).await;
            return false;
        }

        let reachable = self.await_response(&socket, target).await;
        send_verdict(&socket, target, reachable).await;

        if reachable {
            tracing::debug!(%target, "probe answered");
        } else {
            tracing::info!(%target, "probe unanswered, server unreachable");
        }
        reachable
    }

    async fn await_response(&self, socket: &UdpSocket, target: SocketAddr) -> bool {
        let mut buf = [0u8; RECV_BUF];
        match timeout(self.socket_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => {
                let matched = ProbePacket::matches(&buf[..len], &ProbePacket::response());
                if !matched {
                    tracing::debug!(%target, len, "probe reply did not match");
                }
                matched
            }
            Ok(Err(e)) => {
                tracing::debug!(%target, error = %e, "probe recv failed");
                false
            }
            Err(_) => {
                tracing::debug!(
                    %target,
                    timeout_secs = self.socket_timeout.as_secs_f64(),
                    "probe timed out"
                );
                false
            }
        }
    }
}

/// Bind an ephemeral socket of `target`'s family and connect it, so only
/// datagrams from `target` are delivered to us.
async fn bind_for(target: SocketAddr) -> std::io::Result<UdpSocket> {
    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    Ok(socket)
}

async fn send_verdict(socket: &UdpSocket, target: SocketAddr, reachable: bool) {
    let verdict = if reachable {
        ProbePacket::ack_ok()
    } else {
        ProbePacket::ack_err()
    };
    if let Err(e) = socket.send(verdict.as_bytes()).await {
        tracing::debug!(%target, error = %e, "probe verdict not sent");
    }
}
