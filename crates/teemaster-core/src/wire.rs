//! TeeMaster wire formats.
//!
//! Two encodings cross process boundaries:
//!
//! - `ProbePacket`: the fixed 8-byte UDP datagram used by the reachability
//!   check. `#[repr(C)]` with zerocopy derives, so parsing is a length check
//!   plus a byte compare. A datagram of any other length is not a packet.
//! - The federation listing: MessagePack of `Vec<ListedServer>`, stored in the
//!   shared cache under each instance's identifier. See `encode_listing`.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::entry::ListedServer;

// ── Reachability probe ───────────────────────────────────────────────────────

/// Every probe datagram starts with four 0xFF bytes.
pub const PROBE_MAGIC: [u8; 4] = [0xFF; 4];

/// master → server: "are you there?"
pub const TAG_CHALLENGE: [u8; 4] = *b"fw??";
/// server → master: "yes".
pub const TAG_RESPONSE: [u8; 4] = *b"fw!!";
/// master → server: response received, you are reachable.
pub const TAG_ACK_OK: [u8; 4] = *b"fwok";
/// master → server: no valid response, you are not reachable.
pub const TAG_ACK_ERR: [u8; 4] = *b"fwer";

/// Wire size of a probe datagram.
pub const PROBE_PACKET_LEN: usize = 8;

/// One reachability probe datagram.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct ProbePacket {
    /// Always `PROBE_MAGIC`.
    pub magic: [u8; 4],
    /// One of the `TAG_*` constants.
    pub tag: [u8; 4],
}

assert_eq_size!(ProbePacket, [u8; PROBE_PACKET_LEN]);

impl ProbePacket {
    const fn with_tag(tag: [u8; 4]) -> Self {
        Self {
            magic: PROBE_MAGIC,
            tag,
        }
    }

    pub const fn challenge() -> Self {
        Self::with_tag(TAG_CHALLENGE)
    }

    pub const fn response() -> Self {
        Self::with_tag(TAG_RESPONSE)
    }

    pub const fn ack_ok() -> Self {
        Self::with_tag(TAG_ACK_OK)
    }

    pub const fn ack_err() -> Self {
        Self::with_tag(TAG_ACK_ERR)
    }

    /// Parse a received datagram. `None` unless it is exactly 8 bytes with
    /// the magic prefix.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        let packet = Self::read_from(datagram)?;
        (packet.magic == PROBE_MAGIC).then_some(packet)
    }

    /// Exact byte-for-byte match against `expected`, length included.
    pub fn matches(datagram: &[u8], expected: &ProbePacket) -> bool {
        datagram == expected.as_bytes()
    }
}

// ── Federation listing ───────────────────────────────────────────────────────

/// Encode a listing for the shared cache.
///
/// Named-field MessagePack maps, so a peer running a newer build that adds a
/// field can still be read.
pub fn encode_listing(servers: &[ListedServer]) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(servers)
}

/// Decode a listing fetched from the shared cache.
pub fn decode_listing(bytes: &[u8]) -> Result<Vec<ListedServer>, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
