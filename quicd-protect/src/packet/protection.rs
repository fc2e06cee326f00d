//! # Header Protection (RFC 9001 Section 5.4)
//!
//! Header protection masks the low bits of the first byte and the packet
//! number field with a keystream block derived from a 16-byte sample of
//! the ciphertext. The sample starts 4 bytes past the start of the packet
//! number field, whatever the real packet number length is.
//!
//! Removal is two-phase: unmask the first byte, learn the packet number
//! length from it, then unmask that many packet number bytes. The packet
//! number length, the mask and the packet number are secret, so both
//! directions work on a fixed 4-byte window with arithmetic masks and
//! never branch on them. Retry packets are never protected.

#![forbid(unsafe_code)]

use super::header::{
    LONG_PROTECTED_BITS_MASK, PACKET_NUMBER_LENGTH_MASK, SHORT_PROTECTED_BITS_MASK,
};
use super::number::pn_size_mask;
use crate::crypto::{HeaderKeystream, HeaderProtectionAlgorithm, SAMPLE_LEN};
use crate::error::{Error, Result};

/// Distance from the start of the packet number field to the sample
pub const SAMPLE_OFFSET: usize = 4;

/// Bytes required in the packet from the packet number field onwards
pub const MIN_PROTECTED_TAIL: usize = SAMPLE_OFFSET + SAMPLE_LEN;

fn protected_bits_mask(is_short: bool) -> u8 {
    if is_short {
        SHORT_PROTECTED_BITS_MASK
    } else {
        LONG_PROTECTED_BITS_MASK
    }
}

fn sample(buf: &[u8], pn_offset: usize) -> Result<[u8; SAMPLE_LEN]> {
    let start = pn_offset + SAMPLE_OFFSET;
    let bytes = buf
        .get(start..start + SAMPLE_LEN)
        .ok_or(Error::NotEnoughData)?;

    let mut out = [0u8; SAMPLE_LEN];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Compute the 16-byte header protection mask for `sample`
///
/// ChaCha20 (RFC 9001 Section 5.4.4): the first 4 bytes are the
/// little-endian block counter, the remaining 12 the nonce.
/// AES (RFC 9001 Section 5.4.3): the sample is one counter block, 12
/// bytes of IV followed by a big-endian 32-bit counter.
pub fn header_mask(
    keystream: &mut dyn HeaderKeystream,
    sample: &[u8; SAMPLE_LEN],
) -> Result<[u8; SAMPLE_LEN]> {
    let mut iv = [0u8; 12];
    let mut counter_bytes = [0u8; 4];
    let counter = match keystream.algorithm() {
        HeaderProtectionAlgorithm::ChaCha20 => {
            counter_bytes.copy_from_slice(&sample[..4]);
            iv.copy_from_slice(&sample[4..]);
            u32::from_le_bytes(counter_bytes)
        }
        HeaderProtectionAlgorithm::Aes128 | HeaderProtectionAlgorithm::Aes256 => {
            iv.copy_from_slice(&sample[..12]);
            counter_bytes.copy_from_slice(&sample[12..]);
            u32::from_be_bytes(counter_bytes)
        }
    };

    keystream.init(&iv, counter);
    keystream.update_block()
}

/// XOR `mask[1..5]`, cut down to `pn_len` bytes, into the 4-byte window at
/// `pn_offset`.
fn mask_packet_number(buf: &mut [u8], pn_offset: usize, mask: &[u8; SAMPLE_LEN], pn_len: usize) {
    let window = &mut buf[pn_offset..pn_offset + 4];

    let mut current = [0u8; 4];
    current.copy_from_slice(window);
    let mut pn_mask = [0u8; 4];
    pn_mask.copy_from_slice(&mask[1..5]);

    let masked =
        u32::from_be_bytes(current) ^ (u32::from_be_bytes(pn_mask) & pn_size_mask(pn_len));
    window.copy_from_slice(&masked.to_be_bytes());
}

/// Apply header protection in place.
///
/// `buf` holds the whole packet with the AEAD output already written;
/// `pn_offset` is the public header length.
///
/// # Errors
///
/// `NotEnoughData` if the packet ends before the end of the sample.
pub fn apply_header_protection(
    keystream: &mut dyn HeaderKeystream,
    buf: &mut [u8],
    is_short: bool,
    pn_offset: usize,
    pn_len: usize,
) -> Result<()> {
    let mask = header_mask(keystream, &sample(buf, pn_offset)?)?;

    buf[0] ^= mask[0] & protected_bits_mask(is_short);
    mask_packet_number(buf, pn_offset, &mask, pn_len);
    Ok(())
}

/// Remove header protection in place and return the packet number length.
///
/// Only bytes covered by the recovered length are changed; the rest of the
/// 4-byte window is XORed with zero.
///
/// # Errors
///
/// - `NotEnoughData`: the packet ends before the end of the sample
/// - `Decode`: the keystream provider failed on the sample
pub fn remove_header_protection(
    keystream: &mut dyn HeaderKeystream,
    buf: &mut [u8],
    is_short: bool,
    pn_offset: usize,
) -> Result<usize> {
    let sample = sample(buf, pn_offset)?;
    // Sample bytes are attacker-chosen; a failure here rejects one packet
    let mask = header_mask(keystream, &sample).map_err(|_| Error::Decode)?;

    buf[0] ^= mask[0] & protected_bits_mask(is_short);
    let pn_len = usize::from(buf[0] & PACKET_NUMBER_LENGTH_MASK) + 1;
    mask_packet_number(buf, pn_offset, &mask, pn_len);
    Ok(pn_len)
}
