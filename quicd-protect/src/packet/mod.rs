//! # QUIC Packets (RFC 9000 Section 12, 17; RFC 9001 Section 5)
//!
//! Header codec, packet number codec, header protection and the
//! encrypt/decrypt orchestrator built on top of them.

pub mod api;
pub mod header;
pub mod number;
pub mod parser;
pub mod protection;

pub use api::{protected_payload_length, DecryptedPacket, PacketProtection, MAX_CIPHER_LEN};
pub use header::{
    serialize_header, Header, LongHeader, LongHeaderSpecifics, PacketType, ShortHeader,
};
pub use number::PacketNumber;
pub use parser::{parse_header, validate_header};
