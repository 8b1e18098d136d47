//! STUN message header, encode/decode, and FINGERPRINT handling.

use crc::{Crc, CRC_32_ISO_HDLC};
use thiserror::Error;

use crate::attr::{
    decode_xor_addr, encode_xor_addr, Attribute, ATTR_FINGERPRINT, ATTR_SOFTWARE,
    ATTR_XOR_MAPPED_ADDRESS,
};

/// STUN magic cookie (RFC 8489).
pub const MAGIC_COOKIE: u32 = 0x2112A442;

/// Fixed STUN header size in bytes.
pub const HEADER_SIZE: usize = 20;

/// FINGERPRINT XOR constant, the ASCII bytes of "STUN".
const FINGERPRINT_XOR: u32 = 0x5354554e;

/// CRC-32 calculator for FINGERPRINT.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// STUN message types handled by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MessageType {
    /// Binding Request (0x0001).
    BindingRequest = 0x0001,
    /// Binding Success Response (0x0101).
    BindingSuccess = 0x0101,
    /// Binding Error Response (0x0111).
    BindingError = 0x0111,
}

impl TryFrom<u16> for MessageType {
    type Error = StunError;

    fn try_from(value: u16) -> Result<Self, StunError> {
        match value {
            0x0001 => Ok(Self::BindingRequest),
            0x0101 => Ok(Self::BindingSuccess),
            0x0111 => Ok(Self::BindingError),
            other => Err(StunError::InvalidMessageType(other)),
        }
    }
}

/// Errors while decoding STUN wire data.
#[derive(Debug, Error)]
pub enum StunError {
    #[error("STUN message too short: {0} bytes")]
    TooShort(usize),
    #[error("unsupported STUN message type: 0x{0:04x}")]
    InvalidMessageType(u16),
    #[error("invalid STUN magic cookie: 0x{0:08x}")]
    InvalidMagicCookie(u32),
    #[error("declared length {declared} exceeds buffer ({available} bytes)")]
    LengthMismatch { declared: usize, available: usize },
    #[error("invalid STUN attribute")]
    InvalidAttribute,
}

/// A STUN message: type, 12-byte transaction ID, ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: MessageType,
    pub transaction_id: [u8; 12],
    pub attributes: Vec<Attribute>,
}

impl Message {
    /// Create a Binding Request with the given transaction ID.
    pub fn binding_request(transaction_id: [u8; 12]) -> Self {
        Self {
            msg_type: MessageType::BindingRequest,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// Create an empty Binding Success Response echoing `transaction_id`.
    pub fn binding_success(transaction_id: [u8; 12]) -> Self {
        Self {
            msg_type: MessageType::BindingSuccess,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// Serialize the message without a FINGERPRINT.
    ///
    /// Any `Attribute::Fingerprint` in the list is skipped: fingerprints
    /// are only ever computed at encode time so they stay consistent with
    /// the bytes that precede them.
    pub fn encode(&self) -> Vec<u8> {
        let attrs = self.encode_attributes();
        let mut buf = Vec::with_capacity(HEADER_SIZE + attrs.len());
        self.push_header(&mut buf, attrs.len() as u16);
        buf.extend_from_slice(&attrs);
        buf
    }

    /// Serialize the message with a FINGERPRINT appended as the final
    /// attribute, computed over all preceding bytes.
    pub fn encode_with_fingerprint(&self) -> Vec<u8> {
        let attrs = self.encode_attributes();
        let mut buf = Vec::with_capacity(HEADER_SIZE + attrs.len() + 8);
        // The header length must already account for the 8-byte
        // FINGERPRINT attribute when the CRC is taken.
        self.push_header(&mut buf, (attrs.len() + 8) as u16);
        buf.extend_from_slice(&attrs);

        let crc = CRC32.checksum(&buf) ^ FINGERPRINT_XOR;
        push_attribute(&mut buf, ATTR_FINGERPRINT, &crc.to_be_bytes());
        buf
    }

    /// Parse a STUN message from wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, StunError> {
        if data.len() < HEADER_SIZE {
            return Err(StunError::TooShort(data.len()));
        }

        let msg_type = MessageType::try_from(u16::from_be_bytes([data[0], data[1]]))?;
        let msg_len = u16::from_be_bytes([data[2], data[3]]) as usize;

        let cookie = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if cookie != MAGIC_COOKIE {
            return Err(StunError::InvalidMagicCookie(cookie));
        }

        if data.len() < HEADER_SIZE + msg_len {
            return Err(StunError::LengthMismatch {
                declared: msg_len,
                available: data.len() - HEADER_SIZE,
            });
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&data[8..HEADER_SIZE]);

        let mut attributes = Vec::new();
        let mut offset = HEADER_SIZE;
        let end = HEADER_SIZE + msg_len;

        while offset + 4 <= end {
            let attr_type = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let attr_len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4;
            if offset + attr_len > end {
                return Err(StunError::InvalidAttribute);
            }
            let value = &data[offset..offset + attr_len];

            let attr = match attr_type {
                ATTR_XOR_MAPPED_ADDRESS => {
                    Attribute::XorMappedAddress(decode_xor_addr(value, &transaction_id)?)
                }
                ATTR_FINGERPRINT if attr_len == 4 => Attribute::Fingerprint(u32::from_be_bytes([
                    value[0], value[1], value[2], value[3],
                ])),
                ATTR_SOFTWARE => {
                    Attribute::Software(String::from_utf8_lossy(value).into_owned())
                }
                _ => Attribute::Unknown {
                    attr_type,
                    data: value.to_vec(),
                },
            };
            attributes.push(attr);

            // Attributes are padded to a 4-byte boundary.
            offset += attr_len + ((4 - (attr_len % 4)) % 4);
        }

        // The declared length must be consumed exactly; stray trailing
        // bytes that cannot form an attribute header are an error, as is
        // a final attribute whose padding runs past the declared end.
        if offset != end {
            return Err(StunError::InvalidAttribute);
        }

        Ok(Self {
            msg_type,
            transaction_id,
            attributes,
        })
    }

    /// The XOR-MAPPED-ADDRESS carried by this message, if any.
    pub fn xor_mapped_address(&self) -> Option<std::net::SocketAddr> {
        self.attributes.iter().find_map(|attr| match attr {
            Attribute::XorMappedAddress(addr) => Some(*addr),
            _ => None,
        })
    }

    fn push_header(&self, buf: &mut Vec<u8>, length: u16) {
        buf.extend_from_slice(&(self.msg_type as u16).to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        buf.extend_from_slice(&self.transaction_id);
    }

    fn encode_attributes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for attr in &self.attributes {
            match attr {
                Attribute::XorMappedAddress(addr) => {
                    let value = encode_xor_addr(*addr, &self.transaction_id);
                    push_attribute(&mut buf, ATTR_XOR_MAPPED_ADDRESS, &value);
                }
                Attribute::Software(text) => {
                    push_attribute(&mut buf, ATTR_SOFTWARE, text.as_bytes());
                }
                Attribute::Unknown { attr_type, data } => {
                    push_attribute(&mut buf, *attr_type, data);
                }
                Attribute::Fingerprint(_) => {}
            }
        }
        buf
    }
}

fn push_attribute(buf: &mut Vec<u8>, attr_type: u16, value: &[u8]) {
    buf.extend_from_slice(&attr_type.to_be_bytes());
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value);
    let padding = (4 - (value.len() % 4)) % 4;
    buf.extend(std::iter::repeat(0u8).take(padding));
}

/// Whether a datagram looks like STUN: the top two bits of the first
/// byte are zero and the magic cookie is in place. This is the
/// demultiplexing check FINGERPRINT exists to back up.
pub fn is_stun(data: &[u8]) -> bool {
    data.len() >= HEADER_SIZE
        && data[0] & 0xC0 == 0
        && u32::from_be_bytes([data[4], data[5], data[6], data[7]]) == MAGIC_COOKIE
}

/// Verify a trailing FINGERPRINT attribute against the bytes before it.
pub fn verify_fingerprint(data: &[u8]) -> bool {
    if data.len() < HEADER_SIZE + 8 {
        return false;
    }
    let fp_start = data.len() - 8;
    let attr_type = u16::from_be_bytes([data[fp_start], data[fp_start + 1]]);
    let attr_len = u16::from_be_bytes([data[fp_start + 2], data[fp_start + 3]]);
    if attr_type != ATTR_FINGERPRINT || attr_len != 4 {
        return false;
    }
    let claimed = u32::from_be_bytes([
        data[fp_start + 4],
        data[fp_start + 5],
        data[fp_start + 6],
        data[fp_start + 7],
    ]);
    CRC32.checksum(&data[..fp_start]) ^ FINGERPRINT_XOR == claimed
}

/// Generate a random 12-byte transaction ID.
pub fn transaction_id() -> [u8; 12] {
    use rand::RngCore;
    let mut id = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut id);
    id
}
