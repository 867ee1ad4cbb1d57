//! Criterion benchmarks for the IPC frame codec.
//!
//! Measures header encode/decode plus JSON payload parsing for the payload
//! shapes seen most often on a live connection.
//!
//! Run with:
//! ```bash
//! cargo bench --package discord-ipc-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use discord_ipc_core::protocol::codec::{decode_frame, decode_json, encode_frame, OpCode};
use discord_ipc_core::protocol::messages::{Command, CommandEnvelope, Event, Handshake, Payload};
use serde_json::json;

// ── Payload fixtures ──────────────────────────────────────────────────────────

fn handshake_bytes() -> Vec<u8> {
    serde_json::to_vec(&Handshake::new("869104832227733514")).unwrap()
}

fn command_bytes() -> Vec<u8> {
    let env = CommandEnvelope::new(Command::GetChannels, json!({"guild_id": null}), None);
    serde_json::to_vec(&env).unwrap()
}

fn subscribe_bytes() -> Vec<u8> {
    let env = CommandEnvelope::new(
        Command::Subscribe,
        json!({"channel_id": "199737254929760256"}),
        Some(Event::MessageCreate),
    );
    serde_json::to_vec(&env).unwrap()
}

fn ready_bytes() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "cmd": "DISPATCH",
        "evt": "READY",
        "data": {
            "v": 1,
            "config": {"cdn_host": "cdn.discordapp.com", "environment": "production"},
            "user": {"id": "53908232506183680", "username": "Mason", "discriminator": "1337"}
        },
        "nonce": null
    }))
    .unwrap()
}

fn channels_reply_bytes(count: usize) -> Vec<u8> {
    let channels: Vec<_> = (0..count)
        .map(|i| json!({"id": i.to_string(), "name": format!("channel-{i}"), "type": 0}))
        .collect();
    serde_json::to_vec(&json!({
        "cmd": "GET_CHANNELS",
        "data": {"channels": channels},
        "nonce": "6c2b1f3e-8f41-4e2b-a3d4-1a6f0e4c9b2d"
    }))
    .unwrap()
}

/// Benchmarks `encode_frame` for typical outgoing payloads.
fn bench_encode(c: &mut Criterion) {
    let payloads: &[(&str, OpCode, Vec<u8>)] = &[
        ("Handshake", OpCode::Handshake, handshake_bytes()),
        ("GetChannels", OpCode::Message, command_bytes()),
        ("Subscribe", OpCode::Message, subscribe_bytes()),
    ];

    let mut group = c.benchmark_group("encode_frame");
    for (name, op, body) in payloads {
        group.bench_with_input(BenchmarkId::new("payload", name), body, |b, body| {
            b.iter(|| encode_frame(black_box(*op), black_box(body)))
        });
    }
    group.finish();
}

/// Benchmarks frame decoding plus JSON parsing for typical incoming payloads.
fn bench_decode(c: &mut Criterion) {
    let payloads: &[(&str, Vec<u8>)] = &[
        ("Ready", ready_bytes()),
        ("GetChannels(10)", channels_reply_bytes(10)),
        ("GetChannels(200)", channels_reply_bytes(200)),
    ];

    let mut group = c.benchmark_group("decode_frame");
    for (name, body) in payloads {
        let bytes = encode_frame(OpCode::Message, body);
        group.bench_with_input(BenchmarkId::new("payload", name), &bytes, |b, bytes| {
            b.iter(|| {
                let (_, body, _) = decode_frame(black_box(bytes)).expect("decode must succeed");
                let value = decode_json(body).expect("json must parse");
                Payload::from_value(&value)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
