//! Events delivered to subscribers.

use discord_ipc_core::protocol::messages::Payload;
use discord_ipc_core::OpCode;
use serde_json::Value;

/// Decoded body of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    /// Parsed JSON document.
    Json(Value),
    /// Raw bytes of a PING/PONG frame whose body is not JSON.
    Raw(Vec<u8>),
}

/// One frame as read off the socket.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub op: OpCode,
    pub body: PacketBody,
}

impl Packet {
    /// Creates a packet carrying a JSON body.
    pub fn json(op: OpCode, value: Value) -> Self {
        Self {
            op,
            body: PacketBody::Json(value),
        }
    }

    /// The JSON body, if this packet has one.
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            PacketBody::Json(value) => Some(value),
            PacketBody::Raw(_) => None,
        }
    }

    /// Typed view of the body, if it is a command payload.
    pub fn payload(&self) -> Option<Payload> {
        self.value().and_then(Payload::from_value)
    }
}

/// An item of the event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcEvent {
    /// A frame received from the desktop application.
    Packet(Packet),
    /// Terminal marker; the stream ends right after it.
    Close,
}

impl IpcEvent {
    /// Returns the packet, or `None` for the close marker.
    pub fn packet(&self) -> Option<&Packet> {
        match self {
            IpcEvent::Packet(packet) => Some(packet),
            IpcEvent::Close => None,
        }
    }
}
