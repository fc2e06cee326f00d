//! # Packet Protection (RFC 9001 Section 5.3, 5.4)
//!
//! [`PacketProtection`] ties the header codec, packet number codec, AEAD and
//! header protection together for one direction of one encryption level.
//!
//! ```text
//! encrypt: serialize header + pn -> seal payload (AAD = header) -> apply HP
//! decrypt: remove HP -> validate header -> expand pn -> open payload
//! ```
//!
//! Both directions work in place on caller-owned buffers. Retry packets
//! skip both AEAD and header protection.

#![forbid(unsafe_code)]

use super::header::{
    Header, HEADER_FORM_BIT, LONG_PACKET_TYPE_MASK, LONG_PACKET_TYPE_RETRY,
};
use super::number::{self, PacketNumber};
use super::parser::{read_header, validate_header};
use super::protection::{apply_header_protection, remove_header_protection, MIN_PROTECTED_TAIL};
use crate::crypto::{
    Aead, AeadAlgorithm, CryptoBackend, HeaderKeystream, PacketKeys, NONCE_LEN, TAG_LEN,
};
use crate::ct;
use crate::error::{Error, Result};
use std::fmt;
use zeroize::Zeroizing;

/// Ceiling on the protected payload length accepted by [`PacketProtection::decrypt`]
pub const MAX_CIPHER_LEN: u64 = 4_294_950_796;

/// Length field value for a packet carrying `plaintext_len` bytes
///
/// Covers the packet number field, the payload and the AEAD tag.
pub fn protected_payload_length(pn_len: usize, plaintext_len: usize) -> u64 {
    (pn_len + plaintext_len + TAG_LEN) as u64
}

/// Successfully unprotected packet
///
/// All borrows point into the buffer passed to `decrypt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptedPacket<'a> {
    /// Unprotected header
    pub header: Header<'a>,

    /// Reconstructed full packet number. For Retry, the `last_pn` passed in.
    pub packet_number: PacketNumber,

    /// Header length including the packet number field
    pub header_len: usize,

    /// Decrypted payload, empty for Retry
    pub payload: &'a [u8],

    /// Bytes of the buffer taken by this packet. The next coalesced packet
    /// (RFC 9000 Section 12.2) starts here.
    pub total_len: usize,
}

/// AEAD and header protection keys for one direction
pub struct PacketProtection {
    aead: Box<dyn Aead>,
    iv: Zeroizing<[u8; NONCE_LEN]>,
    hp: Box<dyn HeaderKeystream>,
}

impl fmt::Debug for PacketProtection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketProtection")
            .field("aead", &self.aead.algorithm())
            .field("hp", &self.hp.algorithm())
            .finish_non_exhaustive()
    }
}

impl PacketProtection {
    /// Build the AEAD and header protection primitives from derived keys.
    ///
    /// # Errors
    ///
    /// `UnsupportedAlgorithm` if `backend` cannot provide `aead` or its
    /// header protection cipher.
    pub fn new(backend: &dyn CryptoBackend, aead: AeadAlgorithm, keys: &PacketKeys) -> Result<Self> {
        Ok(Self {
            aead: backend.create_aead(aead, &keys.key)?,
            iv: keys.iv.clone(),
            hp: backend.create_header_keystream(aead.header_protection(), &keys.hp_key)?,
        })
    }

    pub fn algorithm(&self) -> AeadAlgorithm {
        self.aead.algorithm()
    }

    /// Replace the AEAD key and IV for a new key phase.
    ///
    /// `keys.hp_key` is ignored: header protection keys do not change on
    /// key update (RFC 9001 Section 6).
    pub fn update_packet_keys(&mut self, backend: &dyn CryptoBackend, keys: &PacketKeys) -> Result<()> {
        self.aead = backend.create_aead(self.aead.algorithm(), &keys.key)?;
        self.iv = keys.iv.clone();
        Ok(())
    }

    /// Per-packet nonce (RFC 9001 Section 5.3): the IV XORed with the
    /// packet number, left-padded to 12 bytes.
    fn nonce(&self, packet_number: PacketNumber) -> [u8; NONCE_LEN] {
        let mut nonce = *self.iv;
        for (n, p) in nonce[NONCE_LEN - 8..]
            .iter_mut()
            .zip(packet_number.to_be_bytes())
        {
            *n ^= p;
        }
        nonce
    }

    /// Protect one packet into `dst` and return the number of bytes written.
    ///
    /// Non-Retry packets need `header.header_len() + plaintext.len() + 16`
    /// bytes. Long headers must declare a Length of
    /// [`protected_payload_length`]. Retry packets produce the header only;
    /// `packet_number` and `plaintext` are ignored.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: header field out of range, Length not matching the
    ///   payload, or a packet too short for a header protection sample
    /// - `BufferTooSmall`: `dst` is shorter than the packet
    /// - `Crypto`: the AEAD or keystream provider failed
    pub fn encrypt(
        &mut self,
        dst: &mut [u8],
        header: &Header<'_>,
        packet_number: PacketNumber,
        plaintext: &[u8],
    ) -> Result<usize> {
        header.check()?;

        let pn_len = match header.pn_len() {
            Some(pn_len) => pn_len,
            None => return super::header::serialize_header(header, packet_number, dst),
        };

        let pn_offset = header.public_header_len();
        let header_len = pn_offset + pn_len;
        let total = header_len + plaintext.len() + TAG_LEN;

        if let Some(length) = header.payload_and_pn_length() {
            if length != protected_payload_length(pn_len, plaintext.len()) {
                return Err(Error::InvalidInput("length field does not match payload"));
            }
        }
        if total < pn_offset + MIN_PROTECTED_TAIL {
            return Err(Error::InvalidInput(
                "packet too short for a header protection sample",
            ));
        }
        if dst.len() < total {
            return Err(Error::BufferTooSmall(total));
        }

        super::header::serialize_header(header, packet_number, dst)?;

        let nonce = self.nonce(packet_number);
        let (head, rest) = dst.split_at_mut(header_len);
        let (body, tag_out) = rest[..plaintext.len() + TAG_LEN].split_at_mut(plaintext.len());
        body.copy_from_slice(plaintext);
        let tag = self.aead.seal_in_place(&nonce, head, body)?;
        tag_out.copy_from_slice(&tag);

        apply_header_protection(
            self.hp.as_mut(),
            &mut dst[..total],
            header.is_short(),
            pn_offset,
            pn_len,
        )?;

        Ok(total)
    }

    /// Unprotect the packet at the start of `packet` in place.
    ///
    /// `short_dcid_len` is the length of connection IDs this endpoint
    /// issued. `last_pn` is the largest packet number received so far in
    /// this packet number space.
    ///
    /// # Errors
    ///
    /// - `NotEnoughData`, `Malformed`: the header is structurally invalid
    ///   (header bytes are public, so these are reported as such)
    /// - `Decode`: authentication failed
    pub fn decrypt<'a>(
        &mut self,
        packet: &'a mut [u8],
        short_dcid_len: usize,
        last_pn: PacketNumber,
    ) -> Result<DecryptedPacket<'a>> {
        let len = packet.len();
        let result = self.unprotect(packet, short_dcid_len, last_pn);
        if let Err(e) = &result {
            tracing::trace!(error = %e, len, "rejected packet");
        }
        result
    }

    fn unprotect<'a>(
        &mut self,
        packet: &'a mut [u8],
        short_dcid_len: usize,
        last_pn: PacketNumber,
    ) -> Result<DecryptedPacket<'a>> {
        let first = *packet.first().ok_or(Error::NotEnoughData)?;
        let is_short = first & HEADER_FORM_BIT == 0;

        // Retry is never protected, its type bits are readable as-is
        if !is_short && first & LONG_PACKET_TYPE_MASK == LONG_PACKET_TYPE_RETRY {
            let packet: &'a [u8] = packet;
            let header_len = validate_header(short_dcid_len, packet, 0)?;
            return Ok(DecryptedPacket {
                header: read_header(packet, short_dcid_len),
                packet_number: last_pn,
                header_len,
                payload: &packet[header_len..header_len],
                // Retry carries no Length field and cannot be coalesced
                total_len: packet.len(),
            });
        }

        let pn_offset = validate_header(short_dcid_len, packet, 0)?;
        if packet.len() < pn_offset + MIN_PROTECTED_TAIL {
            return Err(Error::NotEnoughData);
        }

        let pn_len = remove_header_protection(self.hp.as_mut(), packet, is_short, pn_offset)?;
        let header_len = pn_offset + pn_len;
        let packet_number = number::read_packet_number(last_pn, pn_len, &packet[pn_offset..]);

        // Remaining bytes always cover a tag: the tail check above leaves at
        // least 16 past a 4-byte packet number, and Length is at least 20
        let remaining = (packet.len() - header_len) as u64;
        let declared = read_header(packet, short_dcid_len)
            .payload_length()
            .unwrap_or(remaining);
        let cipher_len = ct::max_u64(
            ct::min_u64(ct::min_u64(declared, remaining), MAX_CIPHER_LEN - 1),
            TAG_LEN as u64,
        ) as usize;

        let nonce = self.nonce(packet_number);
        let (head, rest) = packet.split_at_mut(header_len);
        let (body, tag) = rest[..cipher_len].split_at_mut(cipher_len - TAG_LEN);
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag);
        self.aead
            .open_in_place(&nonce, head, body, &tag_bytes)
            .map_err(|_| Error::Decode)?;

        let packet: &'a [u8] = packet;
        Ok(DecryptedPacket {
            header: read_header(packet, short_dcid_len),
            packet_number,
            header_len,
            payload: &packet[header_len..header_len + cipher_len - TAG_LEN],
            total_len: header_len + cipher_len,
        })
    }
}
