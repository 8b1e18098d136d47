//! STUN attributes and the XOR address codec.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::message::{StunError, MAGIC_COOKIE};

// Attribute types (RFC 8489).
pub(crate) const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
pub(crate) const ATTR_SOFTWARE: u16 = 0x8022;
pub(crate) const ATTR_FINGERPRINT: u16 = 0x8028;

// Address families inside address attributes.
const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;

/// A parsed STUN attribute.
///
/// Only the attributes the guard produces or inspects are decoded;
/// everything else is preserved as `Unknown` so fingerprint checks over
/// foreign messages still work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// XOR-MAPPED-ADDRESS (0x0020) — the reflexive transport address,
    /// obfuscated so NAT devices cannot rewrite it in flight.
    XorMappedAddress(SocketAddr),
    /// FINGERPRINT (0x8028) — CRC-32 over the preceding message bytes.
    Fingerprint(u32),
    /// SOFTWARE (0x8022) — free-form software description.
    Software(String),
    /// Any attribute this crate does not interpret.
    Unknown { attr_type: u16, data: Vec<u8> },
}

/// Encode a socket address in XOR-MAPPED-ADDRESS form.
///
/// IPv4 addresses are XORed with the magic cookie; IPv6 addresses with
/// the cookie concatenated with the transaction ID. The port is always
/// XORed with the top half of the cookie.
pub fn encode_xor_addr(addr: SocketAddr, txn_id: &[u8; 12]) -> Vec<u8> {
    let xor_port = addr.port() ^ (MAGIC_COOKIE >> 16) as u16;
    let mut out = Vec::with_capacity(20);
    out.push(0); // reserved
    match addr.ip() {
        IpAddr::V4(ip) => {
            out.push(FAMILY_IPV4);
            out.extend_from_slice(&xor_port.to_be_bytes());
            let cookie = MAGIC_COOKIE.to_be_bytes();
            for (octet, key) in ip.octets().iter().zip(cookie.iter()) {
                out.push(octet ^ key);
            }
        }
        IpAddr::V6(ip) => {
            out.push(FAMILY_IPV6);
            out.extend_from_slice(&xor_port.to_be_bytes());
            let mut key = [0u8; 16];
            key[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            key[4..].copy_from_slice(txn_id);
            for (octet, key) in ip.octets().iter().zip(key.iter()) {
                out.push(octet ^ key);
            }
        }
    }
    out
}

/// Decode an XOR-MAPPED-ADDRESS attribute value.
pub fn decode_xor_addr(data: &[u8], txn_id: &[u8; 12]) -> Result<SocketAddr, StunError> {
    if data.len() < 8 {
        return Err(StunError::InvalidAttribute);
    }
    let family = data[1];
    let port = u16::from_be_bytes([data[2], data[3]]) ^ (MAGIC_COOKIE >> 16) as u16;

    match family {
        FAMILY_IPV4 => {
            let cookie = MAGIC_COOKIE.to_be_bytes();
            let mut octets = [0u8; 4];
            for i in 0..4 {
                octets[i] = data[4 + i] ^ cookie[i];
            }
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        FAMILY_IPV6 => {
            if data.len() < 20 {
                return Err(StunError::InvalidAttribute);
            }
            let mut key = [0u8; 16];
            key[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
            key[4..].copy_from_slice(txn_id);
            let mut octets = [0u8; 16];
            for i in 0..16 {
                octets[i] = data[4 + i] ^ key[i];
            }
            Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(octets)), port))
        }
        _ => Err(StunError::InvalidAttribute),
    }
}
