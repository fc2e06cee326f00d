//! # Zero-Copy Header Validation and Parsing (RFC 9000 Section 17)
//!
//! Parsing is split in two. [`validate_header`] is the only function that
//! bounds-checks: it walks the header and reports either the end of the
//! public header or why the bytes cannot be a header. [`read_header`] then
//! reads fields positionally from validated bytes with no checks and no
//! backtracking. [`parse_header`] runs both.
//!
//! Every bounds failure is `NotEnoughData`, so a prefix of a valid header
//! never produces `Malformed`. `Malformed` is reserved for bytes that no
//! amount of extra data can fix.

#![forbid(unsafe_code)]

use super::header::{
    Header, LongHeader, LongHeaderSpecifics, PacketType, ProtectedBits, ShortHeader, FIXED_BIT,
    HEADER_FORM_BIT, LONG_PROTECTED_BITS_MASK, MAX_CID_LENGTH, MAX_TOKEN_LENGTH,
    MIN_PAYLOAD_LENGTH, SPIN_BIT,
};
use crate::error::{Error, Result};
use crate::varint::VarIntCodec;

/// Advance past `len` bytes starting at `pos`
fn take(buf: &[u8], pos: usize, len: usize) -> Result<usize> {
    let end = pos.checked_add(len).ok_or(Error::NotEnoughData)?;
    if end > buf.len() {
        return Err(Error::NotEnoughData);
    }
    Ok(end)
}

/// Advance past a one-byte length prefix and the connection ID it announces
fn take_cid(buf: &[u8], pos: usize) -> Result<usize> {
    let len = usize::from(*buf.get(pos).ok_or(Error::NotEnoughData)?);
    if len > MAX_CID_LENGTH {
        return Err(Error::Malformed);
    }
    take(buf, pos + 1, len)
}

/// Advance past the Length field, which must cover at least a header
/// protection sample
fn take_payload_length(buf: &[u8], pos: usize) -> Result<usize> {
    let end = VarIntCodec::validate(buf, pos)?;
    if VarIntCodec::decode(buf, pos) < MIN_PAYLOAD_LENGTH {
        return Err(Error::Malformed);
    }
    Ok(end)
}

/// Validate the header starting at `pos`.
///
/// `short_dcid_len` is the destination connection ID length the endpoint
/// issued; short headers do not carry it. Returns the position just past
/// the public header, which is the packet number offset for every type
/// but Retry.
///
/// The first byte may still be header-protected: only the form, fixed and
/// type bits are inspected.
///
/// # Errors
///
/// - `NotEnoughData`: the buffer ends inside the header
/// - `Malformed`: fixed bit clear, connection ID longer than 20 bytes,
///   token longer than 16383 bytes, Length below 20, or a non-minimal varint
pub fn validate_header(short_dcid_len: usize, buf: &[u8], pos: usize) -> Result<usize> {
    let first = *buf.get(pos).ok_or(Error::NotEnoughData)?;

    // RFC 9000 Section 17.2, 17.3: fixed bit must be set in both forms
    if first & FIXED_BIT == 0 {
        return Err(Error::Malformed);
    }

    let body = pos + 1;
    if first & HEADER_FORM_BIT == 0 {
        return take(buf, body, short_dcid_len);
    }

    let cursor = take(buf, body, 4)?;
    let cursor = take_cid(buf, cursor)?;
    let cursor = take_cid(buf, cursor)?;

    match PacketType::from_long_first_byte(first) {
        PacketType::Initial => {
            let token_start = VarIntCodec::validate(buf, cursor)?;
            let token_len = VarIntCodec::decode(buf, cursor);
            if token_len > MAX_TOKEN_LENGTH {
                return Err(Error::Malformed);
            }
            let token_end = take(buf, token_start, token_len as usize)?;
            take_payload_length(buf, token_end)
        }
        PacketType::ZeroRtt | PacketType::Handshake => take_payload_length(buf, cursor),
        PacketType::Retry => take_cid(buf, cursor),
        PacketType::OneRtt => Err(Error::Malformed),
    }
}

fn read_cid(packet: &[u8], pos: usize) -> (&[u8], usize) {
    let len = usize::from(packet[pos]);
    (&packet[pos + 1..pos + 1 + len], pos + 1 + len)
}

/// Read an unprotected header that already passed [`validate_header`] at
/// position 0 with the same `short_dcid_len`.
pub(crate) fn read_header(packet: &[u8], short_dcid_len: usize) -> Header<'_> {
    let first = packet[0];

    if first & HEADER_FORM_BIT == 0 {
        let bits = ProtectedBits::from_short(first);
        return Header::Short(ShortHeader {
            reserved_bits: bits.reserved_bits,
            spin: first & SPIN_BIT != 0,
            key_phase: bits.key_phase,
            dcid: &packet[1..1 + short_dcid_len],
            pn_len: bits.pn_len,
        });
    }

    let version = u32::from_be_bytes([packet[1], packet[2], packet[3], packet[4]]);
    let (dcid, pos) = read_cid(packet, 5);
    let (scid, pos) = read_cid(packet, pos);
    let bits = ProtectedBits::from_long(first);

    let specifics = match PacketType::from_long_first_byte(first) {
        PacketType::Initial => {
            let token_len = VarIntCodec::decode(packet, pos) as usize;
            let token_start = VarIntCodec::skip(packet, pos);
            let length_pos = token_start + token_len;
            LongHeaderSpecifics::Initial {
                reserved_bits: bits.reserved_bits,
                payload_and_pn_length: VarIntCodec::decode(packet, length_pos),
                pn_len: bits.pn_len,
                token: &packet[token_start..length_pos],
            }
        }
        PacketType::ZeroRtt => LongHeaderSpecifics::ZeroRtt {
            reserved_bits: bits.reserved_bits,
            payload_and_pn_length: VarIntCodec::decode(packet, pos),
            pn_len: bits.pn_len,
        },
        PacketType::Handshake => LongHeaderSpecifics::Handshake {
            reserved_bits: bits.reserved_bits,
            payload_and_pn_length: VarIntCodec::decode(packet, pos),
            pn_len: bits.pn_len,
        },
        PacketType::Retry | PacketType::OneRtt => LongHeaderSpecifics::Retry {
            unused: first & LONG_PROTECTED_BITS_MASK,
            odcid: read_cid(packet, pos).0,
        },
    };

    Header::Long(LongHeader {
        version,
        dcid,
        scid,
        specifics,
    })
}

/// Validate and parse the unprotected header at the start of `packet`.
///
/// Header fields borrow from `packet`. For protected packet types the
/// first byte and packet number must already be unprotected.
pub fn parse_header(packet: &[u8], short_dcid_len: usize) -> Result<Header<'_>> {
    validate_header(short_dcid_len, packet, 0)?;
    Ok(read_header(packet, short_dcid_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPhase;
    use crate::packet::header::serialize_header;
    use hex_literal::hex;
    use proptest::prelude::*;

    const RFC_INITIAL: [u8; 22] = hex!("c300000001088394c8f03e5157080000449e00000002");

    #[test]
    fn test_one_byte_buffer_needs_more_data() {
        for first in [0x40u8, 0xc0, 0xd0, 0xe0, 0xf0] {
            assert_eq!(validate_header(8, &[first], 0), Err(Error::NotEnoughData));
        }
        // Zero-length short DCID: the first byte alone is a full public header
        assert_eq!(validate_header(0, &[0x40], 0), Ok(1));
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(validate_header(0, &[], 0), Err(Error::NotEnoughData));
    }

    #[test]
    fn test_fixed_bit_required() {
        assert_eq!(validate_header(0, &[0x00, 0, 0], 0), Err(Error::Malformed));
        assert_eq!(validate_header(0, &[0x80; 32], 0), Err(Error::Malformed));
    }

    #[test]
    fn test_validate_rfc_initial() {
        assert_eq!(validate_header(0, &RFC_INITIAL, 0), Ok(18));
    }

    #[test]
    fn test_validate_at_offset() {
        let mut buf = vec![0xff, 0xff, 0xff];
        buf.extend_from_slice(&RFC_INITIAL);
        assert_eq!(validate_header(0, &buf, 3), Ok(21));
    }

    #[test]
    fn test_cid_too_long() {
        let mut buf = vec![0xe0, 0, 0, 0, 1, 21];
        buf.extend_from_slice(&[0u8; 40]);
        assert_eq!(validate_header(0, &buf, 0), Err(Error::Malformed));
    }

    #[test]
    fn test_payload_length_minimum() {
        // Handshake, empty CIDs, Length 19
        let buf = [0xe0, 0, 0, 0, 1, 0, 0, 19];
        assert_eq!(validate_header(0, &buf, 0), Err(Error::Malformed));

        let buf = [0xe0, 0, 0, 0, 1, 0, 0, 20];
        assert_eq!(validate_header(0, &buf, 0), Ok(8));
    }

    #[test]
    fn test_non_minimal_token_length() {
        // Initial, empty CIDs, token length 0 encoded on two bytes
        let buf = [0xc0, 0, 0, 0, 1, 0, 0, 0x40, 0x00, 20];
        assert_eq!(validate_header(0, &buf, 0), Err(Error::Malformed));
    }

    #[test]
    fn test_token_too_long() {
        // Four-byte token length of 16384
        let mut buf = vec![0xc0, 0, 0, 0, 1, 0, 0, 0x80, 0x00, 0x40, 0x00];
        buf.resize(buf.len() + 16_384 + 1, 20);
        assert_eq!(validate_header(0, &buf, 0), Err(Error::Malformed));
    }

    #[test]
    fn test_retry_header() {
        let buf = [0xf5, 0, 0, 0, 1, 1, 0xaa, 0, 2, 0xbb, 0xcc, 0xde, 0xad];
        assert_eq!(validate_header(0, &buf, 0), Ok(11));

        let header = parse_header(&buf, 0).unwrap();
        assert_eq!(header.packet_type(), PacketType::Retry);
        assert_eq!(header.dcid(), &[0xaa]);
        match header {
            Header::Long(LongHeader {
                specifics: LongHeaderSpecifics::Retry { unused, odcid },
                ..
            }) => {
                assert_eq!(unused, 0x05);
                assert_eq!(odcid, &[0xbb, 0xcc]);
            }
            other => panic!("unexpected header {:?}", other),
        }
    }

    #[test]
    fn test_parse_rfc_initial() {
        let header = parse_header(&RFC_INITIAL, 0).unwrap();
        assert_eq!(header.packet_type(), PacketType::Initial);
        assert_eq!(header.version(), Some(1));
        assert_eq!(header.dcid(), &hex!("8394c8f03e515708"));
        assert_eq!(header.scid(), Some(&[][..]));
        assert_eq!(header.pn_len(), Some(4));
        assert_eq!(header.payload_and_pn_length(), Some(1182));
        assert_eq!(header.header_len(), 22);
    }

    #[test]
    fn test_parse_short_header_fields() {
        let buf = [0x40 | 0x20 | 0x10 | 0x04 | 0x01, 1, 2, 3, 4, 0x77, 0x88];
        let header = parse_header(&buf, 4).unwrap();
        assert_eq!(
            header,
            Header::Short(ShortHeader {
                reserved_bits: 2,
                spin: true,
                key_phase: KeyPhase::One,
                dcid: &[1, 2, 3, 4],
                pn_len: 2,
            })
        );
    }

    #[test]
    fn test_truncations_need_more_data() {
        for len in 0..18 {
            assert_eq!(
                validate_header(0, &RFC_INITIAL[..len], 0),
                Err(Error::NotEnoughData),
                "prefix of length {}",
                len
            );
        }
    }

    fn long_header_strategy() -> impl Strategy<Value = (u8, u32, Vec<u8>, Vec<u8>, Vec<u8>, u64, u8, u8)> {
        (
            0u8..4,
            any::<u32>(),
            proptest::collection::vec(any::<u8>(), 0..=20),
            proptest::collection::vec(any::<u8>(), 0..=20),
            proptest::collection::vec(any::<u8>(), 0..64),
            MIN_PAYLOAD_LENGTH..(1u64 << 40),
            1u8..=4,
            0u8..4,
        )
    }

    proptest! {
        #[test]
        fn prop_serialize_parse_long(
            (kind, version, dcid, scid, extra, length, pn_len, reserved) in long_header_strategy()
        ) {
            let odcid = &extra[..extra.len().min(20)];
            let specifics = match kind {
                0 => LongHeaderSpecifics::Initial {
                    reserved_bits: reserved,
                    payload_and_pn_length: length,
                    pn_len,
                    token: &extra,
                },
                1 => LongHeaderSpecifics::ZeroRtt {
                    reserved_bits: reserved,
                    payload_and_pn_length: length,
                    pn_len,
                },
                2 => LongHeaderSpecifics::Handshake {
                    reserved_bits: reserved,
                    payload_and_pn_length: length,
                    pn_len,
                },
                _ => LongHeaderSpecifics::Retry { unused: reserved, odcid },
            };
            let header = Header::Long(LongHeader { version, dcid: &dcid, scid: &scid, specifics });

            let mut buf = vec![0u8; header.header_len()];
            let written = serialize_header(&header, 0x0102_0304, &mut buf).unwrap();
            prop_assert_eq!(written, buf.len());

            let public_len = header.public_header_len();
            prop_assert_eq!(validate_header(0, &buf, 0), Ok(public_len));
            prop_assert_eq!(parse_header(&buf, 0), Ok(header));

            for len in 0..public_len {
                prop_assert_eq!(validate_header(0, &buf[..len], 0), Err(Error::NotEnoughData));
            }
        }

        #[test]
        fn prop_validated_bytes_are_readable(
            bytes in proptest::collection::vec(any::<u8>(), 0..96),
            cid_len in 0usize..=20,
        ) {
            if let Ok(end) = validate_header(cid_len, &bytes, 0) {
                let header = read_header(&bytes, cid_len);
                prop_assert!(end <= bytes.len());
                prop_assert_eq!(header.public_header_len(), end);
            }
        }
    }
}
