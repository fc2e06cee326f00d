//! # QUIC Packet Header Types and Serialization (RFC 9000 Section 17, RFC 8999)
//!
//! Zero-copy header representation with lifetime-bound views into the
//! packet buffer. Connection IDs and tokens are never copied out of the
//! datagram; they are only copied when serializing a new packet.
//!
//! The low bits of the first byte are the *protected bits*: 5 bits for
//! short headers, 4 for long headers. They are never stored raw. They are
//! packed from the reserved bits, the key phase (short only) and the packet
//! number length, and unpacked again once header protection is removed.

#![forbid(unsafe_code)]

use super::number;
use crate::crypto::KeyPhase;
use crate::error::{Error, Result};
use crate::varint::{VarIntCodec, VARINT_MAX};

// ============================================================================
// Header Form Constants (RFC 8999 Section 5.1, RFC 9000 Section 17)
// ============================================================================

/// Header Form Bit (most significant bit)
/// 1 = Long Header, 0 = Short Header
pub const HEADER_FORM_BIT: u8 = 0x80;

/// Fixed Bit (second most significant bit)
/// MUST be set to 1 in all QUIC packets
pub const FIXED_BIT: u8 = 0x40;

/// Long Packet Type Mask (bits 4-5)
pub const LONG_PACKET_TYPE_MASK: u8 = 0x30;

/// Long Packet Type Values
pub const LONG_PACKET_TYPE_INITIAL: u8 = 0x00;
pub const LONG_PACKET_TYPE_0RTT: u8 = 0x10;
pub const LONG_PACKET_TYPE_HANDSHAKE: u8 = 0x20;
pub const LONG_PACKET_TYPE_RETRY: u8 = 0x30;

/// Spin Bit (Short Header, bit 5). Never masked by header protection.
pub const SPIN_BIT: u8 = 0x20;

/// Key Phase Bit (Short Header, bit 2)
pub const KEY_PHASE_BIT: u8 = 0x04;

/// Packet Number Length Mask (bottom 2 bits)
/// Encodes (packet_number_length - 1)
pub const PACKET_NUMBER_LENGTH_MASK: u8 = 0x03;

/// Bits of the first byte covered by header protection (RFC 9001 Section 5.4.1)
pub const SHORT_PROTECTED_BITS_MASK: u8 = 0x1f;
pub const LONG_PROTECTED_BITS_MASK: u8 = 0x0f;

// ============================================================================
// Field Limits (RFC 9000 Section 17.2)
// ============================================================================

/// Maximum connection ID length in QUIC version 1
pub const MAX_CID_LENGTH: usize = 20;

/// Largest token length accepted in an Initial packet
pub const MAX_TOKEN_LENGTH: u64 = 16_383;

/// Smallest payload-and-packet-number length that leaves room for a
/// 16-byte header protection sample 4 bytes past the packet number start
pub const MIN_PAYLOAD_LENGTH: u64 = 20;

// ============================================================================
// Packet Type Enumeration
// ============================================================================

/// Packet Type (RFC 9000 Section 17)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Initial packet (Long Header, type 0x0)
    Initial,
    /// 0-RTT packet (Long Header, type 0x1)
    ZeroRtt,
    /// Handshake packet (Long Header, type 0x2)
    Handshake,
    /// Retry packet (Long Header, type 0x3)
    Retry,
    /// 1-RTT packet (Short Header)
    OneRtt,
}

impl PacketType {
    /// Decode the long packet type from a first byte
    pub fn from_long_first_byte(first_byte: u8) -> Self {
        match first_byte & LONG_PACKET_TYPE_MASK {
            LONG_PACKET_TYPE_INITIAL => PacketType::Initial,
            LONG_PACKET_TYPE_0RTT => PacketType::ZeroRtt,
            LONG_PACKET_TYPE_HANDSHAKE => PacketType::Handshake,
            _ => PacketType::Retry,
        }
    }
}

// ============================================================================
// Header Structures (Zero-Copy, Lifetime-Bound)
// ============================================================================

/// Short Header (RFC 9000 Section 17.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortHeader<'a> {
    /// Two reserved bits. Zero when sending, accepted verbatim when receiving.
    pub reserved_bits: u8,

    /// Latency spin bit
    pub spin: bool,

    /// Key phase bit
    pub key_phase: KeyPhase,

    /// Destination Connection ID (length known from connection context)
    pub dcid: &'a [u8],

    /// Packet number length in bytes (1-4)
    pub pn_len: u8,
}

/// Long Header (RFC 9000 Section 17.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongHeader<'a> {
    /// QUIC version
    pub version: u32,

    /// Destination Connection ID (0-20 bytes)
    pub dcid: &'a [u8],

    /// Source Connection ID (0-20 bytes)
    pub scid: &'a [u8],

    /// Fields that depend on the long packet type
    pub specifics: LongHeaderSpecifics<'a>,
}

/// Type-specific part of a long header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongHeaderSpecifics<'a> {
    /// Initial (RFC 9000 Section 17.2.2)
    Initial {
        reserved_bits: u8,
        payload_and_pn_length: u64,
        pn_len: u8,
        token: &'a [u8],
    },

    /// 0-RTT (RFC 9000 Section 17.2.3)
    ZeroRtt {
        reserved_bits: u8,
        payload_and_pn_length: u64,
        pn_len: u8,
    },

    /// Handshake (RFC 9000 Section 17.2.4)
    Handshake {
        reserved_bits: u8,
        payload_and_pn_length: u64,
        pn_len: u8,
    },

    /// Retry (RFC 9000 Section 17.2.5)
    ///
    /// Carries no packet number and is never header-protected. The four
    /// low bits of the first byte are unused and kept verbatim.
    Retry { unused: u8, odcid: &'a [u8] },
}

/// Parsed Packet Header (unifies Long and Short headers)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header<'a> {
    /// Long header packet
    Long(LongHeader<'a>),

    /// Short header packet
    Short(ShortHeader<'a>),
}

/// Pack the 5 protected bits of a short header.
pub fn short_protected_bits(reserved_bits: u8, key_phase: KeyPhase, pn_len: u8) -> u8 {
    ((reserved_bits & 0x03) << 3)
        | (key_phase.bit() << 2)
        | (pn_len.wrapping_sub(1) & PACKET_NUMBER_LENGTH_MASK)
}

/// Pack the 4 protected bits of a long header.
pub fn long_protected_bits(reserved_bits: u8, pn_len: u8) -> u8 {
    ((reserved_bits & 0x03) << 2) | (pn_len.wrapping_sub(1) & PACKET_NUMBER_LENGTH_MASK)
}

/// Fields recovered from an unprotected first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedBits {
    pub reserved_bits: u8,
    pub key_phase: KeyPhase,
    pub pn_len: u8,
}

impl ProtectedBits {
    /// Unpack the low bits of a short header first byte.
    pub fn from_short(first_byte: u8) -> Self {
        Self {
            reserved_bits: (first_byte >> 3) & 0x03,
            key_phase: KeyPhase::from_bit(first_byte >> 2),
            pn_len: (first_byte & PACKET_NUMBER_LENGTH_MASK) + 1,
        }
    }

    /// Unpack the low bits of a long header first byte.
    ///
    /// Long headers carry no key phase; it reads as [`KeyPhase::Zero`].
    pub fn from_long(first_byte: u8) -> Self {
        Self {
            reserved_bits: (first_byte >> 2) & 0x03,
            key_phase: KeyPhase::Zero,
            pn_len: (first_byte & PACKET_NUMBER_LENGTH_MASK) + 1,
        }
    }
}

impl<'a> LongHeaderSpecifics<'a> {
    fn packet_type(&self) -> PacketType {
        match self {
            LongHeaderSpecifics::Initial { .. } => PacketType::Initial,
            LongHeaderSpecifics::ZeroRtt { .. } => PacketType::ZeroRtt,
            LongHeaderSpecifics::Handshake { .. } => PacketType::Handshake,
            LongHeaderSpecifics::Retry { .. } => PacketType::Retry,
        }
    }

    /// (reserved_bits, payload_and_pn_length, pn_len) for protected types
    fn protected_fields(&self) -> Option<(u8, u64, u8)> {
        match *self {
            LongHeaderSpecifics::Initial {
                reserved_bits,
                payload_and_pn_length,
                pn_len,
                ..
            }
            | LongHeaderSpecifics::ZeroRtt {
                reserved_bits,
                payload_and_pn_length,
                pn_len,
            }
            | LongHeaderSpecifics::Handshake {
                reserved_bits,
                payload_and_pn_length,
                pn_len,
            } => Some((reserved_bits, payload_and_pn_length, pn_len)),
            LongHeaderSpecifics::Retry { .. } => None,
        }
    }

    /// Encoded length of the type-specific fields
    fn encoded_len(&self) -> usize {
        match *self {
            LongHeaderSpecifics::Initial {
                payload_and_pn_length,
                token,
                ..
            } => {
                VarIntCodec::length_of(token.len() as u64)
                    + token.len()
                    + VarIntCodec::length_of(payload_and_pn_length)
            }
            LongHeaderSpecifics::ZeroRtt {
                payload_and_pn_length,
                ..
            }
            | LongHeaderSpecifics::Handshake {
                payload_and_pn_length,
                ..
            } => VarIntCodec::length_of(payload_and_pn_length),
            LongHeaderSpecifics::Retry { odcid, .. } => 1 + odcid.len(),
        }
    }
}

impl<'a> Header<'a> {
    /// Get the packet type
    pub fn packet_type(&self) -> PacketType {
        match self {
            Header::Long(h) => h.specifics.packet_type(),
            Header::Short(_) => PacketType::OneRtt,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Header::Short(_))
    }

    pub fn is_retry(&self) -> bool {
        matches!(self.packet_type(), PacketType::Retry)
    }

    /// Get destination connection ID
    pub fn dcid(&self) -> &'a [u8] {
        match self {
            Header::Long(h) => h.dcid,
            Header::Short(h) => h.dcid,
        }
    }

    /// Get source connection ID (only available in Long Header)
    pub fn scid(&self) -> Option<&'a [u8]> {
        match self {
            Header::Long(h) => Some(h.scid),
            Header::Short(_) => None,
        }
    }

    /// Get the version (only available in Long Header)
    pub fn version(&self) -> Option<u32> {
        match self {
            Header::Long(h) => Some(h.version),
            Header::Short(_) => None,
        }
    }

    /// Get the key phase (only available in Short Header)
    pub fn key_phase(&self) -> Option<KeyPhase> {
        match self {
            Header::Long(_) => None,
            Header::Short(h) => Some(h.key_phase),
        }
    }

    /// Packet number length, absent for Retry
    pub fn pn_len(&self) -> Option<usize> {
        match self {
            Header::Long(h) => h
                .specifics
                .protected_fields()
                .map(|(_, _, pn_len)| pn_len as usize),
            Header::Short(h) => Some(h.pn_len as usize),
        }
    }

    /// Declared payload-and-packet-number length (Initial, 0-RTT, Handshake)
    pub fn payload_and_pn_length(&self) -> Option<u64> {
        match self {
            Header::Long(h) => h.specifics.protected_fields().map(|(_, len, _)| len),
            Header::Short(_) => None,
        }
    }

    /// Declared payload length without the packet number field
    pub fn payload_length(&self) -> Option<u64> {
        match self {
            Header::Long(h) => h
                .specifics
                .protected_fields()
                .map(|(_, len, pn_len)| len.saturating_sub(u64::from(pn_len))),
            Header::Short(_) => None,
        }
    }

    /// Length of the unprotected part of the header, which is also the
    /// offset of the packet number field
    pub fn public_header_len(&self) -> usize {
        match self {
            Header::Short(h) => 1 + h.dcid.len(),
            // first byte + version + two length-prefixed CIDs
            Header::Long(h) => 7 + h.dcid.len() + h.scid.len() + h.specifics.encoded_len(),
        }
    }

    /// Full header length including the packet number field
    ///
    /// Retry has no packet number, so nothing is added.
    pub fn header_len(&self) -> usize {
        self.public_header_len() + self.pn_len().unwrap_or(0)
    }

    /// First header byte with the protected bits packed in
    pub fn first_byte(&self) -> u8 {
        match self {
            Header::Short(h) => {
                let spin = if h.spin { SPIN_BIT } else { 0 };
                FIXED_BIT | spin | short_protected_bits(h.reserved_bits, h.key_phase, h.pn_len)
            }
            Header::Long(h) => {
                let type_bits = match h.specifics.packet_type() {
                    PacketType::Initial => LONG_PACKET_TYPE_INITIAL,
                    PacketType::ZeroRtt => LONG_PACKET_TYPE_0RTT,
                    PacketType::Handshake => LONG_PACKET_TYPE_HANDSHAKE,
                    _ => LONG_PACKET_TYPE_RETRY,
                };
                let low_bits = match h.specifics {
                    LongHeaderSpecifics::Retry { unused, .. } => unused & LONG_PROTECTED_BITS_MASK,
                    _ => h
                        .specifics
                        .protected_fields()
                        .map(|(reserved, _, pn_len)| long_protected_bits(reserved, pn_len))
                        .unwrap_or(0),
                };
                HEADER_FORM_BIT | FIXED_BIT | type_bits | low_bits
            }
        }
    }

    /// Check that every field is inside its wire domain
    ///
    /// Run before serializing a caller-built header.
    pub fn check(&self) -> Result<()> {
        match self {
            Header::Short(h) => {
                check_cid(h.dcid)?;
                check_protected(h.reserved_bits, h.pn_len)
            }
            Header::Long(h) => {
                check_cid(h.dcid)?;
                check_cid(h.scid)?;
                match h.specifics {
                    LongHeaderSpecifics::Retry { unused, odcid } => {
                        if unused > LONG_PROTECTED_BITS_MASK {
                            return Err(Error::InvalidInput("retry unused bits exceed 4 bits"));
                        }
                        check_cid(odcid)
                    }
                    LongHeaderSpecifics::Initial { token, .. }
                        if token.len() as u64 > MAX_TOKEN_LENGTH =>
                    {
                        Err(Error::InvalidInput("token too long"))
                    }
                    specifics => {
                        let (reserved, length, pn_len) = specifics
                            .protected_fields()
                            .ok_or(Error::InvalidInput("missing packet number fields"))?;
                        if !(MIN_PAYLOAD_LENGTH..=VARINT_MAX).contains(&length) {
                            return Err(Error::InvalidInput("payload length out of range"));
                        }
                        check_protected(reserved, pn_len)
                    }
                }
            }
        }
    }
}

fn check_cid(cid: &[u8]) -> Result<()> {
    if cid.len() > MAX_CID_LENGTH {
        return Err(Error::InvalidInput("connection id longer than 20 bytes"));
    }
    Ok(())
}

fn check_protected(reserved_bits: u8, pn_len: u8) -> Result<()> {
    if reserved_bits > 0x03 {
        return Err(Error::InvalidInput("reserved bits exceed 2 bits"));
    }
    if !(1..=4).contains(&pn_len) {
        return Err(Error::InvalidInput("packet number length must be 1-4"));
    }
    Ok(())
}

// ============================================================================
// Serialization (RFC 9000 Section 17.2, 17.3)
// ============================================================================

/// Write `header` followed by the truncated `packet_number` into `buf`.
///
/// Returns the number of bytes written, which equals
/// [`Header::header_len`]. Bytes of `buf` past the packet number field
/// are left untouched. Retry headers ignore `packet_number`.
pub fn serialize_header(header: &Header<'_>, packet_number: u64, buf: &mut [u8]) -> Result<usize> {
    header.check()?;

    let header_len = header.header_len();
    if buf.len() < header_len {
        return Err(Error::BufferTooSmall(header_len));
    }

    buf[0] = header.first_byte();
    let mut pos = 1;

    match header {
        Header::Short(h) => {
            pos = put_slice(buf, pos, h.dcid);
        }
        Header::Long(h) => {
            buf[pos..pos + 4].copy_from_slice(&h.version.to_be_bytes());
            pos += 4;
            pos = put_prefixed_cid(buf, pos, h.dcid);
            pos = put_prefixed_cid(buf, pos, h.scid);

            match h.specifics {
                LongHeaderSpecifics::Initial {
                    payload_and_pn_length,
                    token,
                    ..
                } => {
                    pos += VarIntCodec::encode(token.len() as u64, buf, pos)?;
                    pos = put_slice(buf, pos, token);
                    pos += VarIntCodec::encode(payload_and_pn_length, buf, pos)?;
                }
                LongHeaderSpecifics::ZeroRtt {
                    payload_and_pn_length,
                    ..
                }
                | LongHeaderSpecifics::Handshake {
                    payload_and_pn_length,
                    ..
                } => {
                    pos += VarIntCodec::encode(payload_and_pn_length, buf, pos)?;
                }
                LongHeaderSpecifics::Retry { odcid, .. } => {
                    pos = put_prefixed_cid(buf, pos, odcid);
                }
            }
        }
    }

    if let Some(pn_len) = header.pn_len() {
        number::write_packet_number(pn_len, packet_number, &mut buf[pos..])?;
        pos += pn_len;
    }

    debug_assert_eq!(pos, header_len);
    Ok(pos)
}

fn put_slice(buf: &mut [u8], pos: usize, data: &[u8]) -> usize {
    buf[pos..pos + data.len()].copy_from_slice(data);
    pos + data.len()
}

fn put_prefixed_cid(buf: &mut [u8], pos: usize, cid: &[u8]) -> usize {
    buf[pos] = cid.len() as u8;
    put_slice(buf, pos + 1, cid)
}
