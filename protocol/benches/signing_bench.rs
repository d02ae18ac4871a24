// Pickup attestation benchmarks for HashDrop.
//
// Covers Ed25519 keypair generation, pickup message hashing, and signing
// and verifying a pickup attestation through the scheme trait.

use criterion::{criterion_group, criterion_main, Criterion};

use hashdrop_protocol::crypto::{Ed25519Scheme, Keypair};
use hashdrop_protocol::pickup;

const NOW: u64 = 1_700_000_000;

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_pickup_message_hash(c: &mut Criterion) {
    let courier = Keypair::generate().address();

    c.bench_function("pickup/message_hash", |b| {
        b.iter(|| pickup::message_hash(42, &courier, NOW / 3600));
    });
}

fn bench_pickup_sign(c: &mut Criterion) {
    let emitter = Keypair::generate();
    let courier = Keypair::generate().address();

    c.bench_function("pickup/sign", |b| {
        b.iter(|| pickup::sign(&Ed25519Scheme, &emitter, 42, &courier, NOW));
    });
}

fn bench_pickup_verify(c: &mut Criterion) {
    let emitter = Keypair::generate();
    let courier = Keypair::generate().address();
    let signature = pickup::sign(&Ed25519Scheme, &emitter, 42, &courier, NOW);
    let expected = emitter.address();

    c.bench_function("pickup/verify", |b| {
        b.iter(|| pickup::verify(&Ed25519Scheme, &signature, 42, &courier, &expected, NOW));
    });
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_pickup_message_hash,
    bench_pickup_sign,
    bench_pickup_verify,
);
criterion_main!(benches);
