//! Integration tests for packet protection.
//! Tests full encrypt/decrypt workflow through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use hex_literal::hex;
use proptest::prelude::*;
use quicd_protect::crypto::{
    derive_packet_keys, initial_secrets, Aead, HeaderKeystream, HeaderProtectionAlgorithm,
    KeyPhase, NONCE_LEN, TAG_LEN,
};
use quicd_protect::packet::number::read_packet_number;
use quicd_protect::packet::protected_payload_length;
use quicd_protect::{
    validate_header, AeadAlgorithm, CryptoBackend, Error, HashAlgorithm, Header, Index,
    KeyingState, LongHeader, LongHeaderSpecifics, PacketProtection, PacketType, Result,
    RustCryptoBackend, ShortHeader,
};

const CLIENT_DCID: [u8; 8] = hex!("8394c8f03e515708");

fn client_initial_secret() -> Vec<u8> {
    let (client, _) = initial_secrets(&RustCryptoBackend, &CLIENT_DCID).unwrap();
    client.to_vec()
}

fn short_header(dcid: &[u8], pn_len: u8) -> Header<'_> {
    Header::Short(ShortHeader {
        reserved_bits: 0,
        spin: false,
        key_phase: KeyPhase::Zero,
        dcid,
        pn_len,
    })
}

// ============================================================================
// Counting backend
// ============================================================================

/// Delegates to the RustCrypto backend and counts AEAD operations
#[derive(Default)]
struct CountingBackend {
    aead_calls: Arc<AtomicUsize>,
}

struct CountingAead {
    inner: Box<dyn Aead>,
    calls: Arc<AtomicUsize>,
}

impl Aead for CountingAead {
    fn seal_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
    ) -> Result<[u8; TAG_LEN]> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.seal_in_place(nonce, aad, in_out)
    }

    fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        in_out: &mut [u8],
        tag: &[u8; TAG_LEN],
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.open_in_place(nonce, aad, in_out, tag)
    }

    fn algorithm(&self) -> AeadAlgorithm {
        self.inner.algorithm()
    }
}

impl CryptoBackend for CountingBackend {
    fn create_aead(&self, algorithm: AeadAlgorithm, key: &[u8]) -> Result<Box<dyn Aead>> {
        Ok(Box::new(CountingAead {
            inner: RustCryptoBackend.create_aead(algorithm, key)?,
            calls: Arc::clone(&self.aead_calls),
        }))
    }

    fn create_header_keystream(
        &self,
        algorithm: HeaderProtectionAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HeaderKeystream>> {
        RustCryptoBackend.create_header_keystream(algorithm, key)
    }

    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        prk: &mut [u8],
    ) -> Result<()> {
        RustCryptoBackend.hkdf_extract(hash, salt, ikm, prk)
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<()> {
        RustCryptoBackend.hkdf_expand(hash, prk, info, okm)
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_initial_packet_round_trip() {
    // Version 1, 8-byte DCID and SCID, empty token, pn_len 2, 100 zero bytes
    let secret = client_initial_secret();
    let mut client = KeyingState::create(Index::default(), 0, &secret).unwrap();
    let mut server = KeyingState::create(Index::default(), 0, &secret).unwrap();

    let scid = [0x5au8; 8];
    let plaintext = [0u8; 100];
    let header = Header::Long(LongHeader {
        version: 1,
        dcid: &CLIENT_DCID,
        scid: &scid,
        specifics: LongHeaderSpecifics::Initial {
            reserved_bits: 0,
            payload_and_pn_length: protected_payload_length(2, plaintext.len()),
            pn_len: 2,
            token: &[],
        },
    });

    let mut buf = [0u8; 1200];
    let (pn, written) = client.encrypt(&mut buf, &header, &plaintext).unwrap();
    assert_eq!(written, header.header_len() + 100 + TAG_LEN);

    let packet = server.decrypt(&mut buf[..written], 0).unwrap();
    assert_eq!(packet.header, header);
    assert_eq!(packet.header.packet_type(), PacketType::Initial);
    assert_eq!(packet.packet_number, pn);
    assert_eq!(packet.payload, &plaintext[..]);
    assert_eq!(packet.total_len, written);
}

#[test]
fn test_short_header_expansion_crosses_byte_boundary() {
    // RFC 9000 Section 17.1: last 255, truncated 0x00 on one byte is 256
    assert_eq!(read_packet_number(255, 1, &[0x00]), 256);

    let secret = client_initial_secret();
    let mut sender = KeyingState::create(Index::default(), 255, &secret).unwrap();
    let mut receiver = KeyingState::create(Index::default(), 255, &secret).unwrap();

    let dcid = [1u8, 2, 3, 4];
    let mut buf = [0u8; 64];
    let (pn, written) = sender
        .encrypt(&mut buf, &short_header(&dcid, 1), b"boundary")
        .unwrap();
    assert_eq!(pn, 256);

    let packet = receiver.decrypt(&mut buf[..written], dcid.len()).unwrap();
    assert_eq!(packet.packet_number, 256);
    assert_eq!(packet.header.pn_len(), Some(1));
    assert_eq!(receiver.last_packet_number(), 256);
}

#[test]
fn test_one_byte_buffer_is_not_enough_data() {
    for first in 0u8..=255 {
        let result = validate_header(4, &[first], 0);
        assert_ne!(result, Ok(1), "first byte {:#04x}", first);
        if first & 0x40 != 0 {
            assert_eq!(result, Err(Error::NotEnoughData), "first byte {:#04x}", first);
        }
    }
}

#[test]
fn test_retry_never_touches_aead() {
    let backend = CountingBackend::default();
    let secret = client_initial_secret();
    let mut state =
        KeyingState::create_with_backend(&backend, Index::default(), 3, &secret).unwrap();

    let header = Header::Long(LongHeader {
        version: 1,
        dcid: &[0xaa; 4],
        scid: &[0xbb; 6],
        specifics: LongHeaderSpecifics::Retry {
            unused: 0,
            odcid: &CLIENT_DCID,
        },
    });

    let mut buf = [0u8; 64];
    let (_, written) = state.encrypt(&mut buf, &header, &[]).unwrap();
    assert_eq!(written, header.header_len());

    let last_pn = state.last_packet_number();
    let packet = state.decrypt(&mut buf[..written], 0).unwrap();
    assert_eq!(packet.header, header);
    assert!(packet.payload.is_empty());
    assert_eq!(packet.packet_number, last_pn);
    assert_eq!(backend.aead_calls.load(Ordering::SeqCst), 0);

    // A protected packet does go through the AEAD
    let mut buf = [0u8; 64];
    state
        .encrypt(&mut buf, &short_header(&[], 2), b"counted")
        .unwrap();
    assert_eq!(backend.aead_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_all_aeads_round_trip() {
    let suites = [
        (AeadAlgorithm::Aes128Gcm, HashAlgorithm::Sha256),
        (AeadAlgorithm::Aes256Gcm, HashAlgorithm::Sha384),
        (AeadAlgorithm::ChaCha20Poly1305, HashAlgorithm::Sha256),
    ];

    for (aead, hash) in suites {
        let index = Index { aead, hash };
        let secret = vec![0x17u8; hash.output_len()];
        let mut sender = KeyingState::create(index, 40, &secret).unwrap();
        let mut receiver = KeyingState::create(index, 40, &secret).unwrap();

        let plaintext = b"handshake payload";
        let header = Header::Long(LongHeader {
            version: 1,
            dcid: &[9; 12],
            scid: &[8; 3],
            specifics: LongHeaderSpecifics::Handshake {
                reserved_bits: 0,
                payload_and_pn_length: protected_payload_length(3, plaintext.len()),
                pn_len: 3,
            },
        });

        let mut buf = [0u8; 128];
        let (pn, written) = sender.encrypt(&mut buf, &header, plaintext).unwrap();
        let packet = receiver.decrypt(&mut buf[..written], 0).unwrap();
        assert_eq!(packet.packet_number, pn, "{}", aead.name());
        assert_eq!(packet.payload, plaintext, "{}", aead.name());
    }
}

#[test]
fn test_wrong_key_is_decode_error() {
    let secret = client_initial_secret();
    let mut sender = KeyingState::create(Index::default(), 0, &secret).unwrap();
    let mut receiver = KeyingState::create(Index::default(), 0, &[0x01; 32]).unwrap();

    let mut buf = [0u8; 64];
    let (_, written) = sender
        .encrypt(&mut buf, &short_header(&[7; 8], 4), b"secret")
        .unwrap();

    // Header protection removal under the wrong key may yield any pn_len,
    // the header itself still validates
    assert_eq!(receiver.decrypt(&mut buf[..written], 8), Err(Error::Decode));
    assert_eq!(receiver.last_packet_number(), 0);
}

#[test]
fn test_coalesced_datagram() {
    // RFC 9000 Section 12.2: Initial followed by Handshake in one datagram
    let initial_secret = client_initial_secret();
    let handshake_secret = [0x33u8; 32];

    let mut initial_tx = KeyingState::create(Index::default(), 0, &initial_secret).unwrap();
    let mut handshake_tx = KeyingState::create(Index::default(), 0, &handshake_secret).unwrap();
    let mut initial_rx = KeyingState::create(Index::default(), 0, &initial_secret).unwrap();
    let mut handshake_rx = KeyingState::create(Index::default(), 0, &handshake_secret).unwrap();

    let initial = Header::Long(LongHeader {
        version: 1,
        dcid: &CLIENT_DCID,
        scid: &[],
        specifics: LongHeaderSpecifics::Initial {
            reserved_bits: 0,
            payload_and_pn_length: protected_payload_length(1, 50),
            pn_len: 1,
            token: b"token",
        },
    });
    let handshake = Header::Long(LongHeader {
        version: 1,
        dcid: &CLIENT_DCID,
        scid: &[],
        specifics: LongHeaderSpecifics::Handshake {
            reserved_bits: 0,
            payload_and_pn_length: protected_payload_length(2, 70),
            pn_len: 2,
        },
    });

    let mut datagram = BytesMut::new();
    initial_tx
        .encrypt_into(&mut datagram, &initial, &[0xaa; 50])
        .unwrap();
    handshake_tx
        .encrypt_into(&mut datagram, &handshake, &[0xbb; 70])
        .unwrap();

    let first = initial_rx.decrypt(&mut datagram[..], 0).unwrap();
    assert_eq!(first.header.packet_type(), PacketType::Initial);
    assert_eq!(first.payload, &[0xaa; 50]);
    let offset = first.total_len;

    let second = handshake_rx.decrypt(&mut datagram[offset..], 0).unwrap();
    assert_eq!(second.header.packet_type(), PacketType::Handshake);
    assert_eq!(second.payload, &[0xbb; 70]);
    assert_eq!(offset + second.total_len, datagram.len());
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
struct HeaderFields {
    kind: u8,
    version: u32,
    dcid: Vec<u8>,
    scid: Vec<u8>,
    token: Vec<u8>,
    reserved_bits: u8,
    spin: bool,
    key_phase: bool,
    pn_len: u8,
}

impl HeaderFields {
    fn header(&self, plaintext_len: usize) -> Header<'_> {
        let payload_and_pn_length = protected_payload_length(usize::from(self.pn_len), plaintext_len);
        let specifics = match self.kind {
            0 => LongHeaderSpecifics::Initial {
                reserved_bits: self.reserved_bits,
                payload_and_pn_length,
                pn_len: self.pn_len,
                token: &self.token,
            },
            1 => LongHeaderSpecifics::ZeroRtt {
                reserved_bits: self.reserved_bits,
                payload_and_pn_length,
                pn_len: self.pn_len,
            },
            2 => LongHeaderSpecifics::Handshake {
                reserved_bits: self.reserved_bits,
                payload_and_pn_length,
                pn_len: self.pn_len,
            },
            _ => {
                return Header::Short(ShortHeader {
                    reserved_bits: self.reserved_bits,
                    spin: self.spin,
                    key_phase: KeyPhase::from_bit(u8::from(self.key_phase)),
                    dcid: &self.dcid,
                    pn_len: self.pn_len,
                })
            }
        };
        Header::Long(LongHeader {
            version: self.version,
            dcid: &self.dcid,
            scid: &self.scid,
            specifics,
        })
    }
}

fn header_fields() -> impl Strategy<Value = HeaderFields> {
    (
        0u8..4,
        any::<u32>(),
        proptest::collection::vec(any::<u8>(), 0..=20),
        proptest::collection::vec(any::<u8>(), 0..=20),
        proptest::collection::vec(any::<u8>(), 0..40),
        0u8..4,
        any::<bool>(),
        any::<bool>(),
        1u8..=4,
    )
        .prop_map(
            |(kind, version, dcid, scid, token, reserved_bits, spin, key_phase, pn_len)| {
                HeaderFields {
                    kind,
                    version,
                    dcid,
                    scid,
                    token,
                    reserved_bits,
                    spin,
                    key_phase,
                    pn_len,
                }
            },
        )
}

fn chacha_protection() -> PacketProtection {
    let index = Index {
        aead: AeadAlgorithm::ChaCha20Poly1305,
        hash: HashAlgorithm::Sha256,
    };
    let keys = derive_packet_keys(&RustCryptoBackend, index, &[0x42; 32]).unwrap();
    PacketProtection::new(&RustCryptoBackend, index.aead, &keys).unwrap()
}

proptest! {
    #[test]
    fn prop_decrypt_inverts_encrypt(
        fields in header_fields(),
        plaintext in proptest::collection::vec(any::<u8>(), 4..200),
        packet_number in 1u64..(1 << 62),
    ) {
        let mut tx = chacha_protection();
        let mut rx = chacha_protection();
        let header = fields.header(plaintext.len());

        let mut buf = vec![0u8; header.header_len() + plaintext.len() + TAG_LEN];
        let written = tx.encrypt(&mut buf, &header, packet_number, &plaintext).unwrap();
        prop_assert_eq!(written, buf.len());

        let packet = rx.decrypt(&mut buf, fields.dcid.len(), packet_number - 1).unwrap();
        prop_assert_eq!(packet.header, header);
        prop_assert_eq!(packet.packet_number, packet_number);
        prop_assert_eq!(packet.payload, &plaintext[..]);
    }

    #[test]
    fn prop_last_pn_is_max_regardless_of_order(
        initial_pn in 0u64..100_000,
        order in (1usize..16).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
    ) {
        let secret = [0x24u8; 32];
        let mut sender = KeyingState::create(Index::default(), initial_pn, &secret).unwrap();
        let mut receiver = KeyingState::create(Index::default(), initial_pn, &secret).unwrap();

        let packets: Vec<Vec<u8>> = (0..order.len())
            .map(|_| {
                let mut buf = vec![0u8; 64];
                let (_, written) = sender
                    .encrypt(&mut buf, &short_header(&[3; 4], 4), b"monotonic")
                    .unwrap();
                buf.truncate(written);
                buf
            })
            .collect();

        let mut expected = initial_pn;
        for i in order {
            let mut packet = packets[i].clone();
            let decrypted = receiver.decrypt(&mut packet, 4).unwrap();
            prop_assert_eq!(decrypted.packet_number, initial_pn + 1 + i as u64);
            expected = expected.max(decrypted.packet_number);
            prop_assert_eq!(receiver.last_packet_number(), expected);
        }
    }
}
