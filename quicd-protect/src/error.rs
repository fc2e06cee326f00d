//! Error types for packet framing and protection.
//!
//! Structural failures (RFC 9000 Section 17) keep the distinction between
//! "need more bytes" and "reject this packet". Cryptographic failures
//! (RFC 9001 Section 5) collapse into one opaque variant.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type for packet protection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while framing, protecting or unprotecting packets.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer ends before the structure it holds.
    ///
    /// A streaming caller may retry once more bytes of the packet arrive.
    #[error("not enough data")]
    NotEnoughData,

    /// The bytes do not form a legal header.
    ///
    /// Covers illegal first-byte patterns, connection IDs longer than 20
    /// bytes, non-minimal varints and declared lengths below the minimum.
    #[error("malformed packet header")]
    Malformed,

    /// Packet authentication or decryption failed.
    ///
    /// Carries no detail.
    #[error("packet decode failed")]
    Decode,

    /// The provider cannot build the requested algorithm.
    ///
    /// Only produced while creating keying state, never per packet.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(&'static str),

    /// Destination buffer is shorter than the output.
    #[error("buffer too small: need {0} bytes")]
    BufferTooSmall(usize),

    /// A caller-supplied value is outside its domain.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The provider failed while sealing or generating a keystream block.
    #[error("cryptographic provider failure")]
    Crypto,
}

impl Error {
    /// Returns true if retrying with more bytes of the same packet may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NotEnoughData)
    }

    /// Returns true if the error only rejects the current packet.
    ///
    /// The connection-level caller drops the packet and keeps going.
    /// `UnsupportedAlgorithm` is a configuration error and is not per packet.
    pub fn is_per_packet(&self) -> bool {
        matches!(
            self,
            Error::NotEnoughData | Error::Malformed | Error::Decode
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_only_for_short_reads() {
        assert!(Error::NotEnoughData.is_recoverable());
        assert!(!Error::Malformed.is_recoverable());
        assert!(!Error::Decode.is_recoverable());
    }

    #[test]
    fn test_per_packet_classification() {
        assert!(Error::Decode.is_per_packet());
        assert!(Error::Malformed.is_per_packet());
        assert!(!Error::UnsupportedAlgorithm("md5").is_per_packet());
        assert!(!Error::BufferTooSmall(64).is_per_packet());
    }

    #[test]
    fn test_decode_error_is_opaque() {
        assert_eq!(Error::Decode.to_string(), "packet decode failed");
    }
}
