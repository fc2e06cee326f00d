//! # Packet Protection Key Schedule (RFC 9001 Section 5.1, 5.2, 6)
//!
//! Every QUIC key is an HKDF-Expand-Label output (RFC 8446 Section 7.1)
//! over a traffic secret, with an empty context:
//!
//! ```text
//! HkdfLabel = u16 length || u8 label_len || "tls13 " || label || u8 0
//! ```
//!
//! Packet protection labels carry the extra "quic " prefix ("quic key",
//! "quic iv", "quic hp", "quic ku").

#![forbid(unsafe_code)]

use crate::config::Index;
use crate::crypto::backend::{CryptoBackend, HashAlgorithm, NONCE_LEN};
use crate::error::{Error, Result};
use zeroize::Zeroizing;

/// Initial salt for QUIC version 1 (RFC 9001 Section 5.2)
///
/// ```text
/// 38762cf7f55934b34d179ae6a4c80cadccbb7f0a
/// ```
///
/// Drafts 23 to 28 used `c3eef712c72ebb5a11a7d2432bb46365bef9f502` with
/// labels lacking the "tls13 " prefix. Those draft secrets do not
/// interoperate with version 1 peers, so only this salt and the prefixed
/// labels are implemented.
pub const INITIAL_SALT_V1: [u8; 20] = [
    0x38, 0x76, 0x2c, 0xf7, 0xf5, 0x59, 0x34, 0xb3, 0x4d, 0x17, 0x9a, 0xe6, 0xa4, 0xc8, 0x0c,
    0xad, 0xcc, 0xbb, 0x7f, 0x0a,
];

/// TLS 1.3 label prefix
const TLS13_PREFIX: &[u8] = b"tls13 ";

/// TLS 1.3 prefix plus the QUIC packet protection prefix (11 bytes)
pub const QUIC_LABEL_PREFIX: &[u8; 11] = b"tls13 quic ";

pub const LABEL_KEY: &[u8] = b"key";
pub const LABEL_IV: &[u8] = b"iv";
pub const LABEL_HP: &[u8] = b"hp";
pub const LABEL_KU: &[u8] = b"ku";

const LABEL_CLIENT_IN: &[u8] = b"client in";
const LABEL_SERVER_IN: &[u8] = b"server in";

/// Longest full label (prefix included) accepted by `expand_label`
const MAX_FULL_LABEL: usize = 64;

/// Initial secrets are always SHA-256 sized
pub const INITIAL_SECRET_LEN: usize = 32;

/// Derived packet protection keys for one direction
pub struct PacketKeys {
    /// AEAD key
    pub key: Zeroizing<Vec<u8>>,

    /// AEAD IV, XORed with the packet number to form the nonce
    pub iv: Zeroizing<[u8; NONCE_LEN]>,

    /// Header protection key
    pub hp_key: Zeroizing<Vec<u8>>,
}

/// HKDF-Expand-Label with `prefix || label` as the full label
fn expand_label(
    backend: &dyn CryptoBackend,
    hash: HashAlgorithm,
    secret: &[u8],
    prefix: &[u8],
    label: &[u8],
    out: &mut [u8],
) -> Result<()> {
    let label_len = prefix.len() + label.len();
    if label_len > MAX_FULL_LABEL {
        return Err(Error::InvalidInput("hkdf label too long"));
    }
    let out_len =
        u16::try_from(out.len()).map_err(|_| Error::InvalidInput("requested key material too long"))?;

    let mut info = [0u8; 2 + 1 + MAX_FULL_LABEL + 1];
    info[..2].copy_from_slice(&out_len.to_be_bytes());
    info[2] = label_len as u8;
    info[3..3 + prefix.len()].copy_from_slice(prefix);
    info[3 + prefix.len()..3 + label_len].copy_from_slice(label);
    // Empty context: the trailing length byte is already zero
    let info_len = 3 + label_len + 1;

    backend.hkdf_expand(hash, secret, &info[..info_len], out)
}

/// Derive `out.len()` bytes from `secret` under the QUIC label `label`
///
/// The label is prefixed with "tls13 quic ".
pub fn derive_secret(
    backend: &dyn CryptoBackend,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    out: &mut [u8],
) -> Result<()> {
    expand_label(backend, hash, secret, QUIC_LABEL_PREFIX, label, out)
}

/// Derive AEAD key, IV and header protection key (RFC 9001 Section 5.1)
pub fn derive_packet_keys(
    backend: &dyn CryptoBackend,
    index: Index,
    secret: &[u8],
) -> Result<PacketKeys> {
    if secret.len() < index.hash.output_len() {
        return Err(Error::InvalidInput("secret shorter than hash output"));
    }

    let mut key = Zeroizing::new(vec![0u8; index.aead.key_len()]);
    derive_secret(backend, index.hash, secret, LABEL_KEY, &mut key)?;

    let mut iv = Zeroizing::new([0u8; NONCE_LEN]);
    derive_secret(backend, index.hash, secret, LABEL_IV, &mut iv[..])?;

    let mut hp_key = Zeroizing::new(vec![0u8; index.aead.header_protection().key_len()]);
    derive_secret(backend, index.hash, secret, LABEL_HP, &mut hp_key)?;

    Ok(PacketKeys { key, iv, hp_key })
}

/// Secret for the next key phase (RFC 9001 Section 6.1)
pub fn next_traffic_secret(
    backend: &dyn CryptoBackend,
    hash: HashAlgorithm,
    secret: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let mut next = Zeroizing::new(vec![0u8; hash.output_len()]);
    derive_secret(backend, hash, secret, LABEL_KU, &mut next)?;
    Ok(next)
}

/// Client and server Initial secrets for a client-chosen destination
/// connection ID (RFC 9001 Section 5.2)
///
/// Returns `(client_initial_secret, server_initial_secret)`.
pub fn initial_secrets(
    backend: &dyn CryptoBackend,
    connection_id: &[u8],
) -> Result<(Zeroizing<[u8; INITIAL_SECRET_LEN]>, Zeroizing<[u8; INITIAL_SECRET_LEN]>)> {
    let hash = HashAlgorithm::Sha256;

    let mut initial = Zeroizing::new([0u8; INITIAL_SECRET_LEN]);
    backend.hkdf_extract(hash, &INITIAL_SALT_V1, connection_id, &mut initial[..])?;

    let mut client = Zeroizing::new([0u8; INITIAL_SECRET_LEN]);
    expand_label(backend, hash, &initial[..], TLS13_PREFIX, LABEL_CLIENT_IN, &mut client[..])?;

    let mut server = Zeroizing::new([0u8; INITIAL_SECRET_LEN]);
    expand_label(backend, hash, &initial[..], TLS13_PREFIX, LABEL_SERVER_IN, &mut server[..])?;

    Ok((client, server))
}
