//! # Connection Keying State (RFC 9001 Section 5, 6)
//!
//! One [`KeyingState`] holds the packet protection keys for one encryption
//! level of one connection, plus the last packet number seen there. It is
//! the only place that number changes:
//!
//! - `encrypt` uses `last_pn + 1` and stores it once the packet is built
//! - `decrypt` stores `max(last_pn, decoded)` once the packet authenticates
//!
//! A state is not shared between threads. Independent states (per level,
//! per connection) have no shared data.

#![forbid(unsafe_code)]

use crate::config::{ConfigValidator, Index, ProtectionConfig};
use crate::crypto::{derive_packet_keys, CryptoBackend, RustCryptoBackend, TAG_LEN};
use crate::ct;
use crate::error::{Error, Result};
use crate::packet::{DecryptedPacket, Header, PacketNumber, PacketProtection};
use crate::varint::VARINT_MAX;
use bytes::BytesMut;

/// Keys and packet number state for one encryption level
#[derive(Debug)]
pub struct KeyingState {
    index: Index,
    protection: PacketProtection,
    last_pn: PacketNumber,
}

impl KeyingState {
    /// Create a keying state over `secret` with the default backend.
    ///
    /// # Errors
    ///
    /// - `UnsupportedAlgorithm`: the backend cannot provide `index.aead`
    /// - `InvalidInput`: `secret` is shorter than the hash output, or
    ///   `initial_pn` is outside the packet number space
    pub fn create(index: Index, initial_pn: PacketNumber, secret: &[u8]) -> Result<Self> {
        Self::create_with_backend(&RustCryptoBackend, index, initial_pn, secret)
    }

    pub fn create_with_backend(
        backend: &dyn CryptoBackend,
        index: Index,
        initial_pn: PacketNumber,
        secret: &[u8],
    ) -> Result<Self> {
        if initial_pn > VARINT_MAX {
            return Err(Error::InvalidInput("initial packet number above 2^62 - 1"));
        }

        let keys = derive_packet_keys(backend, index, secret)?;
        let protection = PacketProtection::new(backend, index.aead, &keys)?;

        tracing::debug!(
            aead = index.aead.name(),
            hash = index.hash.name(),
            initial_pn,
            "keying state created"
        );

        Ok(Self {
            index,
            protection,
            last_pn: initial_pn,
        })
    }

    /// Validate `config`, then create a keying state from it.
    pub fn from_config(config: &ProtectionConfig, secret: &[u8]) -> Result<Self> {
        if let Err(errors) = config.validate() {
            for error in &errors {
                tracing::warn!(%error, "invalid protection config");
            }
            return Err(Error::InvalidInput("invalid protection config"));
        }
        Self::create(config.index(), config.initial_packet_number, secret)
    }

    pub fn index(&self) -> Index {
        self.index
    }

    /// Largest packet number sent or successfully received
    pub fn last_packet_number(&self) -> PacketNumber {
        self.last_pn
    }

    /// Install the next key phase generation (RFC 9001 Section 6).
    ///
    /// `next_secret` comes from [`crate::crypto::next_traffic_secret`]. The
    /// AEAD key and IV are replaced; the header protection key and the
    /// packet number are kept. Flipping the key phase bit in outgoing
    /// headers is up to the caller.
    pub fn update_keys(&mut self, backend: &dyn CryptoBackend, next_secret: &[u8]) -> Result<()> {
        let keys = derive_packet_keys(backend, self.index, next_secret)?;
        self.protection.update_packet_keys(backend, &keys)?;
        tracing::debug!(aead = self.index.aead.name(), "packet keys updated");
        Ok(())
    }

    /// Protect the next packet into `dst`.
    ///
    /// Returns the packet number used and the bytes written. The packet
    /// number is only committed on success.
    ///
    /// # Errors
    ///
    /// `InvalidInput` once the packet number space is exhausted, plus the
    /// errors of [`PacketProtection::encrypt`].
    pub fn encrypt(
        &mut self,
        dst: &mut [u8],
        header: &Header<'_>,
        plaintext: &[u8],
    ) -> Result<(PacketNumber, usize)> {
        if self.last_pn >= VARINT_MAX {
            return Err(Error::InvalidInput("packet number space exhausted"));
        }
        let packet_number = self.last_pn + 1;

        let written = self
            .protection
            .encrypt(dst, header, packet_number, plaintext)?;
        self.last_pn = packet_number;
        Ok((packet_number, written))
    }

    /// Protect the next packet and append it to `out`.
    ///
    /// `out` is left unchanged on error.
    pub fn encrypt_into(
        &mut self,
        out: &mut BytesMut,
        header: &Header<'_>,
        plaintext: &[u8],
    ) -> Result<PacketNumber> {
        let needed = if header.is_retry() {
            header.header_len()
        } else {
            header.header_len() + plaintext.len() + TAG_LEN
        };

        let start = out.len();
        out.resize(start + needed, 0);
        match self.encrypt(&mut out[start..], header, plaintext) {
            Ok((packet_number, written)) => {
                out.truncate(start + written);
                Ok(packet_number)
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    /// Unprotect the packet at the start of `packet` in place.
    ///
    /// See [`PacketProtection::decrypt`]. A failed packet leaves the state
    /// untouched.
    pub fn decrypt<'a>(
        &mut self,
        packet: &'a mut [u8],
        short_dcid_len: usize,
    ) -> Result<DecryptedPacket<'a>> {
        let decrypted = self.protection.decrypt(packet, short_dcid_len, self.last_pn)?;
        self.last_pn = ct::max_u64(self.last_pn, decrypted.packet_number);
        Ok(decrypted)
    }
}
