//! Binary codec for IPC frames.
//!
//! Wire format:
//! ```text
//! [opcode:4][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes. Both header fields are little-endian `i32`.
//! The payload is UTF-8 JSON for every opcode except raw PING/PONG bodies.
//!
//! There is no checksum and no compression.  The transport is a local stream
//! socket (or named pipe) that already guarantees byte-exact, in-order
//! delivery.

use thiserror::Error;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a header may declare.
///
/// Real frames are a few kilobytes at most.  The cap keeps a corrupt or
/// hostile length from sizing a multi-gigabyte receive buffer.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Errors that can occur while decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer than [`HEADER_SIZE`] bytes were supplied to [`decode_header`].
    #[error("malformed header: need 8 bytes, got {available}")]
    MalformedHeader { available: usize },

    /// The header declared a negative payload length.
    #[error("negative payload length in header: {0}")]
    NegativeLength(i32),

    /// The header declared a payload larger than [`MAX_PAYLOAD_LEN`].
    #[error("payload length {declared} exceeds the {max}-byte limit")]
    FrameTooLarge { declared: usize, max: usize },

    /// The payload bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// The payload is valid UTF-8 but not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
}

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Frame operation code.
///
/// Unknown codes are preserved rather than rejected so a newer desktop client
/// never breaks header decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Handshake,
    Message,
    Close,
    Ping,
    Pong,
    Unknown(i32),
}

impl OpCode {
    /// Returns the numeric wire value.
    pub fn code(self) -> i32 {
        match self {
            OpCode::Handshake => 0,
            OpCode::Message => 1,
            OpCode::Close => 2,
            OpCode::Ping => 3,
            OpCode::Pong => 4,
            OpCode::Unknown(code) => code,
        }
    }

    /// Whether payloads carried under this opcode are raw bytes rather than JSON.
    pub fn is_raw(self) -> bool {
        matches!(self, OpCode::Ping | OpCode::Pong)
    }
}

impl From<i32> for OpCode {
    fn from(value: i32) -> Self {
        match value {
            0 => OpCode::Handshake,
            1 => OpCode::Message,
            2 => OpCode::Close,
            3 => OpCode::Ping,
            4 => OpCode::Pong,
            other => OpCode::Unknown(other),
        }
    }
}

// ── Header ────────────────────────────────────────────────────────────────────

/// Decoded 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Operation code of the frame.
    pub op: OpCode,
    /// Declared payload length, exactly as it appeared on the wire.
    pub length: i32,
}

impl FrameHeader {
    /// Returns the payload length as a buffer size.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::NegativeLength`] if the declared length is negative.
    /// - [`ProtocolError::FrameTooLarge`] if it exceeds [`MAX_PAYLOAD_LEN`].
    pub fn payload_len(&self) -> Result<usize, ProtocolError> {
        let len =
            usize::try_from(self.length).map_err(|_| ProtocolError::NegativeLength(self.length))?;
        if len > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::FrameTooLarge {
                declared: len,
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(len)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes one frame: 8-byte header followed by `payload`.
///
/// Pure and infallible.
///
/// # Examples
///
/// ```rust
/// use discord_ipc_core::protocol::codec::{decode_header, encode_frame, OpCode, HEADER_SIZE};
///
/// let bytes = encode_frame(OpCode::Message, br#"{"cmd":"GET_GUILDS"}"#);
/// let header = decode_header(&bytes).unwrap();
/// assert_eq!(header.op, OpCode::Message);
/// assert_eq!(header.payload_len().unwrap(), bytes.len() - HEADER_SIZE);
/// ```
pub fn encode_frame(op: OpCode, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&op.code().to_le_bytes());
    // Payloads are JSON documents produced by this process; anything past
    // i32::MAX cannot be framed and saturates instead of wrapping.
    let len = i32::try_from(payload.len()).unwrap_or(i32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decodes the 8-byte header at the beginning of `bytes`.
///
/// Extra trailing bytes are ignored; the caller is expected to pass exactly
/// the header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedHeader`] if fewer than [`HEADER_SIZE`]
/// bytes are supplied.
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::MalformedHeader {
            available: bytes.len(),
        });
    }

    let op = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let length = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    Ok(FrameHeader {
        op: OpCode::from(op),
        length,
    })
}

/// Decodes one complete frame (header + payload) from the beginning of `bytes`.
///
/// Returns the opcode, the payload slice and the number of bytes consumed.
/// This is the buffer-oriented counterpart of the streaming reader.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedHeader`] if the buffer holds less than a
/// complete frame, or [`ProtocolError::NegativeLength`] for a corrupt length.
pub fn decode_frame(bytes: &[u8]) -> Result<(OpCode, &[u8], usize), ProtocolError> {
    let header = decode_header(bytes)?;
    let len = header.payload_len()?;
    let total = HEADER_SIZE + len;
    if bytes.len() < total {
        return Err(ProtocolError::MalformedHeader {
            available: bytes.len(),
        });
    }
    Ok((header.op, &bytes[HEADER_SIZE..total], total))
}

/// Parses a payload body as UTF-8 JSON.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidUtf8`] or [`ProtocolError::InvalidJson`].
pub fn decode_json(payload: &[u8]) -> Result<serde_json::Value, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
    serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_little_endian_opcode_then_length() {
        // Arrange / Act
        let bytes = encode_frame(OpCode::Close, b"{}");

        // Assert
        assert_eq!(&bytes[..HEADER_SIZE], &[2, 0, 0, 0, 2, 0, 0, 0]);
        assert_eq!(&bytes[HEADER_SIZE..], b"{}");
    }

    #[test]
    fn test_empty_payload_encodes_header_only() {
        let bytes = encode_frame(OpCode::Ping, b"");
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(decode_header(&bytes).unwrap().length, 0);
    }

    #[test]
    fn test_decode_header_rejects_short_input() {
        // Arrange: only 7 of the 8 header bytes
        let bytes = [1u8, 0, 0, 0, 5, 0, 0];

        // Act
        let result = decode_header(&bytes);

        // Assert
        assert_eq!(result, Err(ProtocolError::MalformedHeader { available: 7 }));
    }

    #[test]
    fn test_decode_header_preserves_unknown_opcode() {
        let mut bytes = 42i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0i32.to_le_bytes());

        let header = decode_header(&bytes).unwrap();

        assert_eq!(header.op, OpCode::Unknown(42));
        assert_eq!(header.op.code(), 42);
    }

    #[test]
    fn test_negative_length_is_rejected_by_payload_len() {
        let mut bytes = 1i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&(-5i32).to_le_bytes());

        let header = decode_header(&bytes).unwrap();

        assert_eq!(header.payload_len(), Err(ProtocolError::NegativeLength(-5)));
    }

    #[test]
    fn test_oversized_length_is_rejected_by_payload_len() {
        // Arrange: one byte over the cap, and exactly at it
        let over = FrameHeader {
            op: OpCode::Message,
            length: (MAX_PAYLOAD_LEN + 1) as i32,
        };
        let at = FrameHeader {
            op: OpCode::Message,
            length: MAX_PAYLOAD_LEN as i32,
        };

        // Act / Assert
        assert_eq!(
            over.payload_len(),
            Err(ProtocolError::FrameTooLarge {
                declared: MAX_PAYLOAD_LEN + 1,
                max: MAX_PAYLOAD_LEN,
            })
        );
        assert_eq!(at.payload_len(), Ok(MAX_PAYLOAD_LEN));
    }

    #[test]
    fn test_opcode_numeric_values_match_wire() {
        assert_eq!(OpCode::Handshake.code(), 0);
        assert_eq!(OpCode::Message.code(), 1);
        assert_eq!(OpCode::Close.code(), 2);
        assert_eq!(OpCode::Ping.code(), 3);
        assert_eq!(OpCode::Pong.code(), 4);
        for code in 0..5 {
            assert_eq!(OpCode::from(code).code(), code);
        }
    }

    #[test]
    fn test_decode_frame_reports_consumed_bytes_for_coalesced_input() {
        // Arrange: two frames back to back, as a stream read may deliver them
        let mut buf = encode_frame(OpCode::Message, br#"{"a":1}"#);
        buf.extend_from_slice(&encode_frame(OpCode::Message, br#"{"b":2}"#));

        // Act
        let (op1, body1, used1) = decode_frame(&buf).unwrap();
        let (op2, body2, used2) = decode_frame(&buf[used1..]).unwrap();

        // Assert
        assert_eq!((op1, body1), (OpCode::Message, &br#"{"a":1}"#[..]));
        assert_eq!((op2, body2), (OpCode::Message, &br#"{"b":2}"#[..]));
        assert_eq!(used1 + used2, buf.len());
    }

    #[test]
    fn test_decode_frame_with_truncated_body_is_malformed() {
        let bytes = encode_frame(OpCode::Message, br#"{"cmd":"X"}"#);
        let result = decode_frame(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedHeader { .. })));
    }

    #[test]
    fn test_decode_json_distinguishes_utf8_from_json_errors() {
        assert_eq!(decode_json(&[0xFF, 0xFE]), Err(ProtocolError::InvalidUtf8));
        assert!(matches!(
            decode_json(b"{not json"),
            Err(ProtocolError::InvalidJson(_))
        ));
        assert_eq!(
            decode_json(br#"{"v":"1"}"#).unwrap(),
            serde_json::json!({"v": "1"})
        );
    }

    #[test]
    fn test_raw_opcodes() {
        assert!(OpCode::Ping.is_raw());
        assert!(OpCode::Pong.is_raw());
        assert!(!OpCode::Message.is_raw());
        assert!(!OpCode::Unknown(9).is_raw());
    }
}
