//! Client error taxonomy.

use discord_ipc_core::ProtocolError;
use thiserror::Error;

use crate::domain::config::ConfigError;

/// Errors surfaced by the connection engine.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Socket discovery tried every candidate endpoint and none existed.
    #[error("no IPC endpoint found after probing {searched} candidate paths")]
    NoEndpointFound { searched: usize },

    /// The connection is closed, or closed while this operation was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// A frame or its JSON payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The desktop application answered the command with `evt: "ERROR"`.
    #[error("remote error [{code}]: {message}")]
    Remote { code: i64, message: String },

    /// The desktop application closed the connection during login.
    #[error("handshake rejected [{code}]: {message}")]
    HandshakeRejected { code: i64, message: String },

    /// The caller supplied a payload that cannot be sent.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// `login` was called while a previous login is still awaiting READY.
    #[error("a login is already waiting for READY")]
    LoginInProgress,

    /// Transport I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
