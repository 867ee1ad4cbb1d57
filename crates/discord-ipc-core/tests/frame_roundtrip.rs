//! Integration tests for the discord-ipc-core frame codec.
//!
//! These tests go through the public API only, combining the codec with the
//! message model the same way the client does when it writes a command and
//! reads a reply.

use discord_ipc_core::{
    decode_header, decode_json, encode_frame,
    protocol::{
        codec::decode_frame,
        messages::{CloseReason, Command, CommandEnvelope, Event, Handshake, Payload},
    },
    OpCode, ProtocolError, HEADER_SIZE,
};
use serde_json::json;

/// Encodes a payload, decodes it back, and returns `(op, body)`.
fn roundtrip(op: OpCode, body: &[u8]) -> (OpCode, Vec<u8>) {
    let bytes = encode_frame(op, body);
    let header = decode_header(&bytes).expect("header must decode");
    let len = header.payload_len().expect("length must be non-negative");
    assert_eq!(len, bytes.len() - HEADER_SIZE, "declared length must match body");
    (header.op, bytes[HEADER_SIZE..].to_vec())
}

#[test]
fn test_roundtrip_every_known_opcode() {
    let body = br#"{"x":1}"#;
    for op in [
        OpCode::Handshake,
        OpCode::Message,
        OpCode::Close,
        OpCode::Ping,
        OpCode::Pong,
    ] {
        assert_eq!(roundtrip(op, body), (op, body.to_vec()));
    }
}

#[test]
fn test_roundtrip_multibyte_utf8_payload() {
    // Length is counted in bytes, not characters.
    let body = r#"{"details":"Deno 🦕","state":"Testing…"}"#.as_bytes();

    let (op, decoded) = roundtrip(OpCode::Message, body);

    assert_eq!(op, OpCode::Message);
    assert_eq!(decoded, body);
    assert_eq!(decode_json(&decoded).unwrap()["details"], "Deno 🦕");
}

#[test]
fn test_roundtrip_raw_ping_body() {
    let body = [0u8, 159, 146, 150];
    assert_eq!(roundtrip(OpCode::Ping, &body), (OpCode::Ping, body.to_vec()));
}

#[test]
fn test_handshake_frame_matches_wire_bytes() {
    // Arrange
    let body = serde_json::to_vec(&Handshake::new("X")).unwrap();

    // Act
    let bytes = encode_frame(OpCode::Handshake, &body);

    // Assert: opcode 0, then the exact JSON length, then the JSON
    let expected_json = br#"{"v":"1","client_id":"X"}"#;
    assert_eq!(&bytes[0..4], &0i32.to_le_bytes());
    assert_eq!(&bytes[4..8], &(expected_json.len() as i32).to_le_bytes());
    assert_eq!(&bytes[8..], expected_json);
}

#[test]
fn test_command_envelope_reply_correlation_by_nonce() {
    // Arrange: the client sends GET_CHANNELS with a fresh nonce
    let env = CommandEnvelope::new(Command::GetChannels, json!({"guild_id": null}), None);
    let sent = encode_frame(OpCode::Message, &serde_json::to_vec(&env).unwrap());
    let (_, sent_body, _) = decode_frame(&sent).unwrap();
    let sent_value = decode_json(sent_body).unwrap();
    assert_eq!(sent_value["cmd"], "GET_CHANNELS");
    assert_eq!(sent_value["args"], json!({"guild_id": null}));

    // Act: the application replies with the same nonce
    let reply = encode_frame(
        OpCode::Message,
        &serde_json::to_vec(&json!({
            "cmd": "GET_CHANNELS",
            "data": {"channels": []},
            "nonce": env.nonce,
        }))
        .unwrap(),
    );
    let (_, reply_body, _) = decode_frame(&reply).unwrap();
    let payload = Payload::from_value(&decode_json(reply_body).unwrap()).unwrap();

    // Assert
    assert_eq!(payload.cmd, Command::GetChannels);
    assert_eq!(payload.nonce.as_deref(), Some(env.nonce.as_str()));
    assert_eq!(payload.data, json!({"channels": []}));
    assert!(!payload.is_error());
}

#[test]
fn test_dispatch_with_unknown_event_still_decodes() {
    let value = json!({"cmd": "DISPATCH", "evt": "ACTIVITY_PARTY_UPDATE", "data": {}});

    let payload = Payload::from_value(&value).unwrap();

    assert!(payload.is_dispatch());
    assert_eq!(
        payload.evt,
        Some(Event::Unknown("ACTIVITY_PARTY_UPDATE".to_string()))
    );
}

#[test]
fn test_close_frame_payload() {
    let body = br#"{"code":4000,"message":"Invalid Client ID"}"#;
    let bytes = encode_frame(OpCode::Close, body);

    let (op, body, _) = decode_frame(&bytes).unwrap();
    let reason = CloseReason::from_value(&decode_json(body).unwrap());

    assert_eq!(op, OpCode::Close);
    assert!(reason.is_invalid_client_id());
    assert_eq!(reason.message, "Invalid Client ID");
}

#[test]
fn test_short_header_is_malformed() {
    let bytes = encode_frame(OpCode::Message, b"{}");
    assert_eq!(
        decode_header(&bytes[..4]),
        Err(ProtocolError::MalformedHeader { available: 4 })
    );
}
