//! # Packet Protection Cryptography (RFC 9001 Section 5)
//!
//! Provider contracts, the RustCrypto-backed provider and the key schedule.

pub mod backend;
pub mod keys;
pub mod rust_crypto;

pub use backend::{
    Aead, AeadAlgorithm, CryptoBackend, HashAlgorithm, HeaderKeystream, HeaderProtectionAlgorithm,
    KeyPhase, NONCE_LEN, SAMPLE_LEN, TAG_LEN,
};
pub use keys::{derive_packet_keys, derive_secret, initial_secrets, next_traffic_secret, PacketKeys};
pub use rust_crypto::RustCryptoBackend;
