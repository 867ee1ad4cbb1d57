//! # discord-ipc-core
//!
//! Wire protocol for the local IPC socket exposed by the Discord desktop
//! application.  This crate has no I/O: it only turns frames into bytes and
//! bytes back into frames, and models the JSON documents those frames carry.
//!
//! - **`protocol::codec`** – the 8-byte little-endian frame header
//!   (`opcode`, `payload_len`) followed by the payload body.
//!
//! - **`protocol::messages`** – command and event names as open enums, the
//!   outgoing command envelope and handshake, and a lenient view of incoming
//!   payloads used for nonce correlation.
//!
//! The async connection engine built on top of this lives in
//! `discord-ipc-client`.

pub mod protocol;

pub use protocol::codec::{
    decode_header, decode_json, encode_frame, OpCode, ProtocolError, HEADER_SIZE,
    MAX_PAYLOAD_LEN,
};
pub use protocol::messages::{Command, CommandEnvelope, Event, Handshake, Payload};
