//! quicd-protect: QUIC Packet Header Codec and Packet Protection
//!
//! Builds and parses QUIC packet headers and applies or removes packet
//! protection, as specified in RFC 9000 and RFC 9001.
//!
//! # Architecture
//!
//! - **Zero-copy parsing**: headers borrow connection IDs and tokens from the packet buffer
//! - **In-place protection**: encrypt and decrypt write into caller-owned buffers
//! - **Constant-time header protection**: no branches on masks, packet number lengths or packet numbers
//! - **Crypto-agnostic**: `CryptoBackend` trait with a RustCrypto adapter as default
//!
//! # RFC Compliance
//!
//! - **RFC 9000**: variable-length integers (16), packet headers (17), packet numbers (17.1, A.2, A.3)
//! - **RFC 9001**: packet protection (5), header protection (5.4), Initial secrets (5.2), key update (6)
//!
//! # Module Organization
//!
//! - `varint`: Variable-length integer codec
//! - `packet`: Header codec, packet numbers, header protection, encrypt/decrypt
//! - `crypto`: Provider traits, RustCrypto provider, key schedule
//! - `connection`: Keying state for one encryption level
//! - `config`: Serde configuration
//!
//! # Example
//!
//! ```
//! use quicd_protect::crypto::{initial_secrets, KeyPhase, RustCryptoBackend};
//! use quicd_protect::{Header, Index, KeyingState, ShortHeader};
//!
//! let (client, _server) = initial_secrets(&RustCryptoBackend, b"\x83\x94\xc8\xf0").unwrap();
//! let index = Index::default();
//! let mut sender = KeyingState::create(index, 0, &client[..]).unwrap();
//! let mut receiver = KeyingState::create(index, 0, &client[..]).unwrap();
//!
//! let header = Header::Short(ShortHeader {
//!     reserved_bits: 0,
//!     spin: false,
//!     key_phase: KeyPhase::Zero,
//!     dcid: &[1, 2, 3, 4],
//!     pn_len: 2,
//! });
//! let mut buf = [0u8; 64];
//! let (pn, len) = sender.encrypt(&mut buf, &header, b"hello").unwrap();
//!
//! let packet = receiver.decrypt(&mut buf[..len], 4).unwrap();
//! assert_eq!(packet.packet_number, pn);
//! assert_eq!(packet.payload, b"hello");
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod packet;
pub mod varint;

mod ct;

// Re-export key types
pub use config::{ConfigValidator, Index, ProtectionConfig};
pub use connection::KeyingState;
pub use crypto::{AeadAlgorithm, CryptoBackend, HashAlgorithm, RustCryptoBackend};
pub use error::{Error, Result};
pub use packet::{
    parse_header, serialize_header, validate_header, DecryptedPacket, Header, LongHeader,
    LongHeaderSpecifics, PacketNumber, PacketProtection, PacketType, ShortHeader,
};
pub use varint::{VarInt, VarIntCodec};
