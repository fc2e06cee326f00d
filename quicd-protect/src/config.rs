//! Packet protection configuration.
//!
//! Deserializable from any serde format. Missing fields take their
//! defaults, so an empty table yields AES-128-GCM with SHA-256.

use crate::crypto::{AeadAlgorithm, HashAlgorithm};
use crate::varint::VARINT_MAX;
use serde::{Deserialize, Serialize};

/// Algorithm pair selecting how a keying state derives and uses its keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub aead: AeadAlgorithm,
    pub hash: HashAlgorithm,
}

impl Default for Index {
    /// AES-128-GCM with SHA-256, the suite every QUIC endpoint implements
    fn default() -> Self {
        Self {
            aead: AeadAlgorithm::Aes128Gcm,
            hash: HashAlgorithm::Sha256,
        }
    }
}

impl Index {
    /// Returns true for the pairings defined as TLS 1.3 cipher suites
    /// (RFC 8446 Appendix B.4)
    pub fn is_tls13_suite(&self) -> bool {
        matches!(
            (self.aead, self.hash),
            (AeadAlgorithm::Aes128Gcm, HashAlgorithm::Sha256)
                | (AeadAlgorithm::Aes256Gcm, HashAlgorithm::Sha384)
                | (AeadAlgorithm::ChaCha20Poly1305, HashAlgorithm::Sha256)
        )
    }
}

/// Configuration validator trait.
pub trait ConfigValidator {
    /// Validate the configuration.
    ///
    /// Returns `Ok(())` if valid, or a list of error messages if invalid.
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// Keying state configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Payload AEAD; also selects the header protection cipher
    pub aead: AeadAlgorithm,

    /// Hash driving HKDF
    pub hash: HashAlgorithm,

    /// Starting value of the last seen packet number
    pub initial_packet_number: u64,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        let index = Index::default();
        Self {
            aead: index.aead,
            hash: index.hash,
            initial_packet_number: 0,
        }
    }
}

impl ProtectionConfig {
    pub fn index(&self) -> Index {
        Index {
            aead: self.aead,
            hash: self.hash,
        }
    }
}

impl ConfigValidator for ProtectionConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.initial_packet_number > VARINT_MAX {
            errors.push(format!(
                "initial_packet_number ({}) exceeds the packet number space (2^62 - 1)",
                self.initial_packet_number
            ));
        }

        // Unusual pairings still work, they are only flagged
        if !self.index().is_tls13_suite() {
            tracing::warn!(
                aead = self.aead.name(),
                hash = self.hash.name(),
                "aead/hash pairing is not a TLS 1.3 cipher suite"
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
