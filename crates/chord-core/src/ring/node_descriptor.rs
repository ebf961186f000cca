//! Ring node identity (spec.md §3, §4.1): a 64-bit identifier derived from
//! an IPv4 address and UDP port, plus the address/port pair needed to
//! actually reach the node.
//!
//! Grounded on `original_source/include/chord_impl.h`'s `get_hash()`, which
//! hashes a `struct sockaddr_in` into the `KEY_LEN`-byte identifier; here we
//! use the `sha1` crate in place of the original's ad hoc byte-hash, per
//! spec.md §4.1's exact derivation formula (SHA-1 digest of the 6
//! big-endian address/port bytes, top 8 bytes taken as the id).

use sha1::{Digest, Sha1};
use std::net::Ipv4Addr;

/// Identity and contact information for a single ring member.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeDescriptor {
    /// 64-bit ring identifier, derived from `ip`/`port` via [`derive_id`].
    pub id: u64,
    /// IPv4 address in host byte order.
    pub ip: Ipv4Addr,
    /// UDP port.
    pub port: u16,
}

impl NodeDescriptor {
    /// Builds a descriptor for `ip:port`, deriving its ring id.
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            id: derive_id(ip, port),
            ip,
            port,
        }
    }

    pub fn socket_addr(&self) -> std::net::SocketAddrV4 {
        std::net::SocketAddrV4::new(self.ip, self.port)
    }
}

/// Derives a node's 64-bit ring identifier per spec.md §4.1: SHA-1 over the
/// 4 big-endian address bytes followed by the 2 big-endian port bytes, then
/// the high 8 bytes of the digest read back as a big-endian `u64`.
pub fn derive_id(ip: Ipv4Addr, port: u16) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update(ip.octets());
    hasher.update(port.to_be_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[0..8].try_into().expect("sha1 digest is 20 bytes"))
}
