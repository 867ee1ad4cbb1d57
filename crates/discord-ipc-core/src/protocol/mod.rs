//! Protocol module containing the frame codec and the JSON message model.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_frame, decode_header, decode_json, encode_frame, FrameHeader, OpCode, ProtocolError,
    HEADER_SIZE,
};
pub use messages::*;
