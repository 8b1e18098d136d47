//! STUN wire format for the turnstile relay guard.
//!
//! Covers the slice of RFC 8489 the guard needs: Binding message
//! encode/decode, XOR-MAPPED-ADDRESS, FINGERPRINT, and classification
//! of inbound packets so STUN can be demultiplexed from other traffic
//! sharing the port.

mod attr;
mod message;

pub use attr::{decode_xor_addr, encode_xor_addr, Attribute};
pub use message::{
    is_stun, transaction_id, verify_fingerprint, Message, MessageType, StunError, HEADER_SIZE,
    MAGIC_COOKIE,
};
