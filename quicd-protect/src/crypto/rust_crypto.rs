//! RustCrypto-backed provider.
//!
//! Thin adapters from the [`CryptoBackend`] contracts to the `aes-gcm`,
//! `chacha20poly1305`, `aes`, `chacha20` and `hkdf` crates. No primitive
//! is implemented here.

#![forbid(unsafe_code)]

use crate::crypto::backend::{
    Aead, AeadAlgorithm, CryptoBackend, HashAlgorithm, HeaderKeystream,
    HeaderProtectionAlgorithm, NONCE_LEN, SAMPLE_LEN, TAG_LEN,
};
use crate::error::{Error, Result};
use aes::cipher::{BlockEncrypt, KeyInit as _};
use aes::{Aes128, Aes256};
use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20::cipher::consts::U10;
use chacha20::cipher::{Block, KeyIvInit, StreamCipherCore, StreamCipherSeekCore};
use chacha20::ChaChaCore;
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

/// Run `$body` with `$h` bound to the digest type for `$hash`.
macro_rules! with_digest {
    ($hash:expr, $h:ident => $body:expr) => {
        match $hash {
            HashAlgorithm::Sha256 => {
                type $h = Sha256;
                $body
            }
            HashAlgorithm::Sha384 => {
                type $h = Sha384;
                $body
            }
            HashAlgorithm::Sha512 => {
                type $h = Sha512;
                $body
            }
        }
    };
}

/// Default provider built on the RustCrypto crates
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCryptoBackend;

impl CryptoBackend for RustCryptoBackend {
    fn create_aead(&self, algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>> {
        let bad_key = |_| Error::UnsupportedAlgorithm(algorithm.name());
        let cipher = match algorithm {
            AeadAlgorithm::Aes128Gcm => {
                AeadCipher::Aes128Gcm(Aes128Gcm::new_from_slice(key).map_err(bad_key)?)
            }
            AeadAlgorithm::Aes256Gcm => {
                AeadCipher::Aes256Gcm(Aes256Gcm::new_from_slice(key).map_err(bad_key)?)
            }
            AeadAlgorithm::ChaCha20Poly1305 => AeadCipher::ChaCha20Poly1305(
                ChaCha20Poly1305::new_from_slice(key).map_err(bad_key)?,
            ),
        };
        Ok(Box::new(RustCryptoAead { algorithm, cipher }))
    }

    fn create_header_keystream(
        &self,
        algorithm: HeaderProtectionAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HeaderKeystream>> {
        let unsupported = Error::UnsupportedAlgorithm("header protection key length");
        match algorithm {
            HeaderProtectionAlgorithm::Aes128 => Ok(Box::new(AesKeystream::new(
                algorithm,
                AesCipher::Aes128(Aes128::new_from_slice(key).map_err(|_| unsupported)?),
            ))),
            HeaderProtectionAlgorithm::Aes256 => Ok(Box::new(AesKeystream::new(
                algorithm,
                AesCipher::Aes256(Aes256::new_from_slice(key).map_err(|_| unsupported)?),
            ))),
            HeaderProtectionAlgorithm::ChaCha20 => {
                let key: [u8; 32] = key.try_into().map_err(|_| unsupported)?;
                Ok(Box::new(ChaChaKeystream {
                    key: Zeroizing::new(key),
                    nonce: [0; 12],
                    counter: 0,
                }))
            }
        }
    }

    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        prk: &mut [u8],
    ) -> Result<()> {
        if prk.len() != hash.output_len() {
            return Err(Error::InvalidInput("prk length must equal hash output"));
        }
        with_digest!(hash, H => {
            let (extracted, _) = Hkdf::<H>::extract(Some(salt), ikm);
            prk.copy_from_slice(&extracted);
        });
        Ok(())
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<()> {
        with_digest!(hash, H => {
            Hkdf::<H>::from_prk(prk)
                .map_err(|_| Error::InvalidInput("secret shorter than hash output"))?
                .expand(info, okm)
                .map_err(|_| Error::InvalidInput("requested key material too long"))
        })
    }
}

// ============================================================================
// AEAD (RFC 9001 Section 5.3)
// ============================================================================

enum AeadCipher {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    ChaCha20Poly1305(ChaCha20Poly1305),
}

struct RustCryptoAead {
    algorithm: AeadAlgorithm,
    cipher: AeadCipher,
}

impl Aead for RustCryptoAead {
    fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
    ) -> Result<[u8; TAG_LEN]> {
        let nonce = GenericArray::<u8, U12>::from_slice(nonce);
        let tag = match &self.cipher {
            AeadCipher::Aes128Gcm(c) => c.encrypt_in_place_detached(nonce, aad, in_out),
            AeadCipher::Aes256Gcm(c) => c.encrypt_in_place_detached(nonce, aad, in_out),
            AeadCipher::ChaCha20Poly1305(c) => c.encrypt_in_place_detached(nonce, aad, in_out),
        }
        .map_err(|_| Error::Crypto)?;

        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(tag.as_slice());
        Ok(out)
    }

    fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<()> {
        let nonce = GenericArray::<u8, U12>::from_slice(nonce);
        let tag = GenericArray::<u8, U16>::from_slice(tag);
        match &self.cipher {
            AeadCipher::Aes128Gcm(c) => c.decrypt_in_place_detached(nonce, aad, in_out, tag),
            AeadCipher::Aes256Gcm(c) => c.decrypt_in_place_detached(nonce, aad, in_out, tag),
            AeadCipher::ChaCha20Poly1305(c) => {
                c.decrypt_in_place_detached(nonce, aad, in_out, tag)
            }
        }
        .map_err(|_| Error::Decode)
    }

    fn algorithm(&self) -> AeadAlgorithm {
        self.algorithm
    }
}

// ============================================================================
// Header Protection Keystreams (RFC 9001 Section 5.4.3, 5.4.4)
// ============================================================================

enum AesCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

/// AES in counter mode over a single block: the keystream block for
/// `iv || counter` equals AES-ECB of the sample.
struct AesKeystream {
    algorithm: HeaderProtectionAlgorithm,
    cipher: AesCipher,
    counter_block: [u8; 16],
}

impl AesKeystream {
    fn new(algorithm: HeaderProtectionAlgorithm, cipher: AesCipher) -> Self {
        Self {
            algorithm,
            cipher,
            counter_block: [0; 16],
        }
    }
}

impl HeaderKeystream for AesKeystream {
    fn algorithm(&self) -> HeaderProtectionAlgorithm {
        self.algorithm
    }

    fn init(&mut self, iv: &[u8; 12], counter: u32) {
        self.counter_block[..12].copy_from_slice(iv);
        self.counter_block[12..].copy_from_slice(&counter.to_be_bytes());
    }

    fn update_block(&mut self) -> Result<[u8; SAMPLE_LEN]> {
        let mut block = aes::Block::clone_from_slice(&self.counter_block);
        match &self.cipher {
            AesCipher::Aes128(c) => c.encrypt_block(&mut block),
            AesCipher::Aes256(c) => c.encrypt_block(&mut block),
        }

        let mut counter = [0u8; 4];
        counter.copy_from_slice(&self.counter_block[12..]);
        let next = u32::from_be_bytes(counter).wrapping_add(1);
        self.counter_block[12..].copy_from_slice(&next.to_be_bytes());

        let mut out = [0u8; SAMPLE_LEN];
        out.copy_from_slice(block.as_slice());
        Ok(out)
    }
}

/// ChaCha20 block function (20 rounds)
type ChaCha20Core = ChaChaCore<U10>;

/// ChaCha20 keystream with a 32-bit block counter and 96-bit nonce
/// (RFC 8439)
///
/// Works on the block core: every counter value, 0xffffffff included,
/// is a valid starting block.
struct ChaChaKeystream {
    key: Zeroizing<[u8; 32]>,
    nonce: [u8; 12],
    counter: u32,
}

impl HeaderKeystream for ChaChaKeystream {
    fn algorithm(&self) -> HeaderProtectionAlgorithm {
        HeaderProtectionAlgorithm::ChaCha20
    }

    fn init(&mut self, iv: &[u8; 12], counter: u32) {
        self.nonce = *iv;
        self.counter = counter;
    }

    fn update_block(&mut self) -> Result<[u8; SAMPLE_LEN]> {
        let mut core = ChaCha20Core::new(
            chacha20::Key::from_slice(&self.key[..]),
            chacha20::Nonce::from_slice(&self.nonce),
        );
        core.set_block_pos(self.counter);

        let mut block = Block::<ChaCha20Core>::default();
        core.write_keystream_block(&mut block);
        self.counter = self.counter.wrapping_add(1);

        let mut out = [0u8; SAMPLE_LEN];
        out.copy_from_slice(&block[..SAMPLE_LEN]);
        Ok(out)
    }
}
