//! # Cryptographic Provider Contracts (RFC 9001 Section 5)
//!
//! Packet protection consumes three primitives through narrow traits:
//!
//! - **AEAD** (RFC 9001 Section 5.3): AES-128-GCM, AES-256-GCM,
//!   ChaCha20-Poly1305, operating in place over the packet buffer.
//! - **Header protection keystream** (RFC 9001 Section 5.4): one 16-byte
//!   block per packet from AES (counter block) or ChaCha20.
//! - **HKDF** (RFC 5869) over SHA-256, SHA-384 or SHA-512.
//!
//! ## Design:
//! The traits abstract the provider so packet protection can be tested
//! against mock crypto and swapped without touching the codec.

#![forbid(unsafe_code)]

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// AEAD nonce length for every QUIC AEAD (RFC 9001 Section 5.3)
pub const NONCE_LEN: usize = 12;

/// AEAD tag length for every QUIC AEAD
pub const TAG_LEN: usize = 16;

/// Header protection sample and mask length (RFC 9001 Section 5.4.2)
pub const SAMPLE_LEN: usize = 16;

/// AEAD Algorithm Identifier (RFC 9001 Section 5.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AeadAlgorithm {
    /// AES-128-GCM
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,

    /// AES-256-GCM
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,

    /// ChaCha20-Poly1305
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    /// Returns the key length in bytes for this algorithm
    pub fn key_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm => 32,
            AeadAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// Header protection cipher of the same family (RFC 9001 Section 5.4.1)
    pub fn header_protection(&self) -> HeaderProtectionAlgorithm {
        match self {
            AeadAlgorithm::Aes128Gcm => HeaderProtectionAlgorithm::Aes128,
            AeadAlgorithm::Aes256Gcm => HeaderProtectionAlgorithm::Aes256,
            AeadAlgorithm::ChaCha20Poly1305 => HeaderProtectionAlgorithm::ChaCha20,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AeadAlgorithm::Aes128Gcm => "aes-128-gcm",
            AeadAlgorithm::Aes256Gcm => "aes-256-gcm",
            AeadAlgorithm::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

/// Header Protection Algorithm (RFC 9001 Section 5.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderProtectionAlgorithm {
    /// AES-128 (for AES-128-GCM)
    Aes128,

    /// AES-256 (for AES-256-GCM)
    Aes256,

    /// ChaCha20 (for ChaCha20-Poly1305)
    ChaCha20,
}

impl HeaderProtectionAlgorithm {
    /// Header protection key length in bytes
    pub fn key_len(&self) -> usize {
        match self {
            HeaderProtectionAlgorithm::Aes128 => 16,
            HeaderProtectionAlgorithm::Aes256 => 32,
            HeaderProtectionAlgorithm::ChaCha20 => 32,
        }
    }
}

/// Hash function driving HKDF (RFC 8446 Section 7.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes, also the minimum PRK length
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }
}

/// Key Phase (RFC 9001 Section 6)
///
/// QUIC supports in-protocol key updates. Each key phase has distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyPhase {
    /// Initial phase (phase 0)
    #[default]
    Zero,

    /// Updated phase (phase 1)
    One,
}

impl KeyPhase {
    /// Build from the low bit of `bit`
    pub fn from_bit(bit: u8) -> Self {
        if bit & 0x01 == 0 {
            KeyPhase::Zero
        } else {
            KeyPhase::One
        }
    }

    pub fn bit(&self) -> u8 {
        match self {
            KeyPhase::Zero => 0,
            KeyPhase::One => 1,
        }
    }
}

/// AEAD Trait (RFC 9001 Section 5.3)
///
/// The nonce is already combined with the packet number by the caller.
/// Both directions run in place so the packet buffer is the only buffer.
pub trait Aead: Send {
    /// Encrypt `in_out` in place and return the authentication tag.
    ///
    /// `aad` is the serialized header including the packet number.
    fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
    ) -> Result<[u8; TAG_LEN]>;

    /// Authenticate and decrypt `in_out` in place.
    ///
    /// # Errors
    /// Returns `Error::Decode` if authentication fails. The contents of
    /// `in_out` are unspecified afterwards.
    fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<()>;

    fn algorithm(&self) -> AeadAlgorithm;
}

/// Header Protection Keystream Trait (RFC 9001 Section 5.4)
///
/// Produces the 16-byte mask block. The key is bound when the keystream
/// is created; `init` binds the per-packet IV and counter taken from the
/// sample.
pub trait HeaderKeystream: Send {
    fn algorithm(&self) -> HeaderProtectionAlgorithm;

    /// Position the keystream at block `counter` under `iv`.
    fn init(&mut self, iv: &[u8; 12], counter: u32);

    /// Keystream block at the current position (the encryption of a zero
    /// block), then advance by one block.
    fn update_block(&mut self) -> Result<[u8; SAMPLE_LEN]>;
}

/// Crypto Backend Trait
///
/// Factory for the per-connection primitives plus the stateless KDF.
pub trait CryptoBackend {
    /// Build an AEAD keyed with `key`.
    ///
    /// # Errors
    /// `UnsupportedAlgorithm` if the provider cannot build `algorithm` or
    /// the key length does not match.
    fn create_aead(&self, algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>>;

    /// Build a header protection keystream keyed with `key`.
    fn create_header_keystream(
        &self,
        algorithm: HeaderProtectionAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HeaderKeystream>>;

    /// HKDF-Extract (RFC 5869 Section 2.2). Writes `hash.output_len()`
    /// bytes of PRK into `prk`.
    fn hkdf_extract(&self, hash: HashAlgorithm, salt: &[u8], ikm: &[u8], prk: &mut [u8])
        -> Result<()>;

    /// HKDF-Expand (RFC 5869 Section 2.3). Fills `okm`.
    fn hkdf_expand(&self, hash: HashAlgorithm, prk: &[u8], info: &[u8], okm: &mut [u8])
        -> Result<()>;
}
