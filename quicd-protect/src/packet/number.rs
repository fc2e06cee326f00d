//! # Packet Number Encoding/Decoding (RFC 9000 Section 17.1)
//!
//! Packet numbers use **truncated encoding** to minimize overhead. Instead of sending
//! the full 62-bit value, QUIC encodes only the least significant bits needed to
//! disambiguate the packet number from recently received packets.
//!
//! ## Decoding Algorithm (RFC 9000 Section A.3)
//!
//! ```text
//! expected  = largest_received + 1
//! win       = 2^(8 * pn_len), hwin = win / 2
//! candidate = (expected & !(win - 1)) | truncated
//!
//! if candidate <= expected - hwin and candidate < 2^62 - win: candidate + win
//! elif candidate > expected + hwin and candidate >= win:      candidate - win
//! else:                                                       candidate
//! ```
//!
//! The truncated value and its length are secret until the payload is
//! authenticated. Expansion, reading and writing evaluate both branches and
//! select arithmetically through [`crate::ct`].

#![forbid(unsafe_code)]

use crate::ct;
use crate::error::{Error, Result};

/// Packet Number (RFC 9000 Section 12.3), 0 to 2^62 - 1
pub type PacketNumber = u64;

/// Exclusive upper bound on packet numbers
const PN_LIMIT: u64 = 1 << 62;

/// Size masks over a big-endian 4-byte window, indexed by `pn_len - 1`
const PN_SIZE_MASKS: [u32; 4] = [0xff00_0000, 0xffff_0000, 0xffff_ff00, 0xffff_ffff];

/// Window sizes 2^(8 * pn_len), indexed by `pn_len - 1`
const PN_WINDOWS: [u64; 4] = [1 << 8, 1 << 16, 1 << 24, 1 << 32];

fn len_index(pn_len: usize) -> u32 {
    (pn_len as u32).wrapping_sub(1)
}

/// Mask selecting the top `pn_len` bytes of a 4-byte window
pub(crate) fn pn_size_mask(pn_len: usize) -> u32 {
    ct::lookup_u32(&PN_SIZE_MASKS, len_index(pn_len))
}

/// Choose the packet number length for sending (RFC 9000 Appendix A.2)
///
/// # Arguments
/// * `full_pn` - The full packet number to encode
/// * `largest_acked` - The largest packet number acknowledged by the peer,
///   or `None` before anything was acknowledged
///
/// # Returns
/// The minimum number of bytes needed (1, 2, 3, or 4)
pub fn encode_length(full_pn: PacketNumber, largest_acked: Option<PacketNumber>) -> usize {
    let num_unacked = match largest_acked {
        Some(acked) => full_pn.saturating_sub(acked),
        None => full_pn.saturating_add(1),
    };

    // RFC 9000 Section A.2: one extra bit so the peer sees a window twice
    // as large as the number of packets in flight
    let min_bits = (64 - num_unacked.leading_zeros()) as usize + 1;
    ((min_bits + 7) / 8).clamp(1, 4)
}

/// Keep the low `8 * pn_len` bits of `full_pn`.
pub fn truncate(full_pn: PacketNumber, pn_len: usize) -> u32 {
    let window = ct::lookup_u64(&PN_WINDOWS, len_index(pn_len));
    (full_pn & window.wrapping_sub(1)) as u32
}

/// Reconstruct a full packet number from its truncated form (RFC 9000 Appendix A.3)
///
/// Returns the value congruent to `truncated` modulo 2^(8 * pn_len) that
/// is closest to `last_pn + 1`. Branch-free.
pub fn expand(last_pn: PacketNumber, pn_len: usize, truncated: u32) -> PacketNumber {
    let expected = last_pn.wrapping_add(1);
    let win = ct::lookup_u64(&PN_WINDOWS, len_index(pn_len));
    let hwin = win >> 1;
    let candidate = (expected & !win.wrapping_sub(1)) | u64::from(truncated);

    let hwin_fits = ct::le_u64(hwin, expected);
    let low_edge = ct::select_u64(hwin_fits, 0, expected.wrapping_sub(hwin));

    let forward = hwin_fits
        & ct::le_u64(candidate, low_edge)
        & ct::lt_u64(candidate, PN_LIMIT - win);
    let backward = !forward
        & ct::lt_u64(expected.wrapping_add(hwin), candidate)
        & ct::le_u64(win, candidate);

    candidate
        .wrapping_add(ct::select_u64(forward, 0, win))
        .wrapping_sub(ct::select_u64(backward, 0, win))
}

/// Copy up to four bytes at the start of `bytes` into a big-endian word.
///
/// Short inputs are zero-padded on the right.
fn load_window(bytes: &[u8]) -> (u32, usize) {
    let n = bytes.len().min(4);
    let mut word = [0u8; 4];
    word[..n].copy_from_slice(&bytes[..n]);
    (u32::from_be_bytes(word), n)
}

/// Decode the truncated packet number at the start of `bytes` and expand it
/// against `last_pn`.
///
/// `bytes` must hold at least `pn_len` bytes. Following bytes are read
/// but ignored, so the read does not depend on `pn_len`.
pub fn read_packet_number(last_pn: PacketNumber, pn_len: usize, bytes: &[u8]) -> PacketNumber {
    let (word, _) = load_window(bytes);
    let shifted = [word >> 24, word >> 16, word >> 8, word];
    expand(last_pn, pn_len, ct::lookup_u32(&shifted, len_index(pn_len)))
}

/// Write the truncated `full_pn` into the first `pn_len` bytes of `out`.
///
/// Bytes past the packet number field keep their value.
///
/// # Errors
///
/// `BufferTooSmall` if `out` is shorter than `pn_len`.
pub fn write_packet_number(pn_len: usize, full_pn: PacketNumber, out: &mut [u8]) -> Result<()> {
    if out.len() < pn_len {
        return Err(Error::BufferTooSmall(pn_len));
    }

    let (before, n) = load_window(out);
    let truncated = truncate(full_pn, pn_len);
    let aligned = [truncated << 24, truncated << 16, truncated << 8, truncated];
    let size_mask = pn_size_mask(pn_len);

    let after = (before & !size_mask) | (ct::lookup_u32(&aligned, len_index(pn_len)) & size_mask);
    out[..n].copy_from_slice(&after.to_be_bytes()[..n]);
    Ok(())
}
