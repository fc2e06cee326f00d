//! Benchmarks for packet protection hot paths.
//!
//! These benchmarks measure performance of:
//! - Short header encrypt and decrypt per AEAD
//! - Initial packet encrypt and decrypt
//! - Header validation and parsing
//!
//! Run with: cargo bench -p quicd-protect --bench protection

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use quicd_protect::crypto::{derive_packet_keys, initial_secrets, KeyPhase, TAG_LEN};
use quicd_protect::packet::protected_payload_length;
use quicd_protect::{
    parse_header, AeadAlgorithm, HashAlgorithm, Header, Index, LongHeader, LongHeaderSpecifics,
    PacketProtection, RustCryptoBackend, ShortHeader,
};

/// Typical 1-RTT payload size for a 1350-byte datagram
const PAYLOAD_LEN: usize = 1300;

const DCID: [u8; 8] = [0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08];

fn protection(aead: AeadAlgorithm) -> PacketProtection {
    let index = Index {
        aead,
        hash: HashAlgorithm::Sha256,
    };
    let keys = derive_packet_keys(&RustCryptoBackend, index, &[0x5c; 32]).unwrap();
    PacketProtection::new(&RustCryptoBackend, aead, &keys).unwrap()
}

fn short_header() -> Header<'static> {
    Header::Short(ShortHeader {
        reserved_bits: 0,
        spin: false,
        key_phase: KeyPhase::Zero,
        dcid: &DCID,
        pn_len: 2,
    })
}

/// Benchmark 1-RTT packet protection (per-packet hot path)
fn bench_short_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("short_packet");
    group.throughput(Throughput::Bytes(PAYLOAD_LEN as u64));

    let header = short_header();
    let plaintext = vec![0x42u8; PAYLOAD_LEN];
    let packet_len = header.header_len() + PAYLOAD_LEN + TAG_LEN;

    for aead in [
        AeadAlgorithm::Aes128Gcm,
        AeadAlgorithm::Aes256Gcm,
        AeadAlgorithm::ChaCha20Poly1305,
    ] {
        let mut tx = protection(aead);
        let mut rx = protection(aead);
        let mut buf = vec![0u8; packet_len];

        group.bench_function(format!("encrypt/{}", aead.name()), |b| {
            let mut pn = 0u64;
            b.iter(|| {
                pn += 1;
                tx.encrypt(&mut buf, black_box(&header), pn, black_box(&plaintext))
            })
        });

        let mut protected = vec![0u8; packet_len];
        tx.encrypt(&mut protected, &header, 1, &plaintext).unwrap();

        group.bench_function(format!("decrypt/{}", aead.name()), |b| {
            b.iter_batched(
                || protected.clone(),
                |mut packet| {
                    rx.decrypt(&mut packet, DCID.len(), 0)
                        .map(|p| p.total_len)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark Initial packet protection, including key derivation
fn bench_initial_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_packet");

    group.bench_function("initial_secrets", |b| {
        b.iter(|| initial_secrets(&RustCryptoBackend, black_box(&DCID)))
    });

    let plaintext = vec![0u8; 1162];
    let header = Header::Long(LongHeader {
        version: 1,
        dcid: &DCID,
        scid: &[],
        specifics: LongHeaderSpecifics::Initial {
            reserved_bits: 0,
            payload_and_pn_length: protected_payload_length(4, plaintext.len()),
            pn_len: 4,
            token: &[],
        },
    });
    let packet_len = header.header_len() + plaintext.len() + TAG_LEN;
    let mut tx = protection(AeadAlgorithm::Aes128Gcm);
    let mut rx = protection(AeadAlgorithm::Aes128Gcm);

    let mut buf = vec![0u8; packet_len];
    group.bench_function("encrypt", |b| {
        b.iter(|| tx.encrypt(&mut buf, black_box(&header), 2, black_box(&plaintext)))
    });

    let mut protected = vec![0u8; packet_len];
    tx.encrypt(&mut protected, &header, 2, &plaintext).unwrap();
    group.bench_function("decrypt", |b| {
        b.iter_batched(
            || protected.clone(),
            |mut packet| rx.decrypt(&mut packet, 0, 1).map(|p| p.total_len),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark header validation and parsing (per-packet hot path)
fn bench_parse_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_header");
    group.throughput(Throughput::Elements(1));

    let mut short = vec![0u8; 64];
    short[0] = 0x41;
    short[1..9].copy_from_slice(&DCID);

    let mut initial = vec![0u8; 64];
    initial[..22].copy_from_slice(&[
        0xc3, 0x00, 0x00, 0x00, 0x01, 0x08, 0x83, 0x94, 0xc8, 0xf0, 0x3e, 0x51, 0x57, 0x08, 0x00,
        0x00, 0x44, 0x9e, 0x00, 0x00, 0x00, 0x02,
    ]);

    group.bench_function("short", |b| {
        b.iter(|| parse_header(black_box(&short), DCID.len()).map(|h| h.header_len()))
    });
    group.bench_function("initial", |b| {
        b.iter(|| parse_header(black_box(&initial), 0).map(|h| h.header_len()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_short_packet,
    bench_initial_packet,
    bench_parse_header,
);

criterion_main!(benches);
