//! Frame-level I/O over any duplex byte stream.
//!
//! Reads use `read_exact` for both the 8-byte header and the payload, so
//! short reads are retried until the declared length is satisfied.  Writes go
//! through a shared, mutex-guarded write half so that each frame reaches the
//! socket as one contiguous `header || payload` block.
//!
//! A write that is stuck on a peer which stopped draining the socket holds
//! the mutex.  [`FrameWriter::cancel`] aborts such writes, releasing the lock,
//! and fails every later write with `ConnectionClosed`.

use std::io;
use std::sync::Arc;

use discord_ipc_core::{decode_header, decode_json, encode_frame, OpCode, HEADER_SIZE};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{watch, Mutex};

use crate::domain::events::PacketBody;
use crate::error::RpcError;

/// Type-erased write half of the connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write half shared by every sender.
pub type SharedWriter = Arc<FrameWriter>;

/// The write half plus the signal that cancels writes to it.
pub struct FrameWriter {
    /// `None` once the connection is closed.
    half: Mutex<Option<BoxedWriter>>,
    cancelled: watch::Sender<bool>,
}

impl FrameWriter {
    /// Aborts in-flight writes and fails every later one.  Never waits.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    async fn write_locked(&self, frame: &[u8]) -> Result<(), RpcError> {
        let mut guard = self.half.lock().await;
        let w = guard.as_mut().ok_or(RpcError::ConnectionClosed)?;
        w.write_all(frame).await?;
        w.flush().await?;
        Ok(())
    }
}

/// Wraps a write half for sharing.
pub fn shared_writer<W>(writer: W) -> SharedWriter
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (cancelled, _) = watch::channel(false);
    Arc::new(FrameWriter {
        half: Mutex::new(Some(Box::new(writer))),
        cancelled,
    })
}

/// Resolves once the writer is cancelled.
async fn until_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // The sender lives as long as the writer borrowed by the caller.
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Reads one complete frame.
///
/// `header` is the connection's scratch buffer for the 8 header bytes.
///
/// # Errors
///
/// - [`RpcError::ConnectionClosed`] if the stream ends anywhere inside the
///   frame, including before the first header byte.
/// - [`RpcError::Protocol`] if the header declares a negative length or one
///   above [`MAX_PAYLOAD_LEN`](discord_ipc_core::MAX_PAYLOAD_LEN).
/// - [`RpcError::Io`] for any other transport failure.
pub async fn read_frame<R>(
    reader: &mut R,
    header: &mut [u8; HEADER_SIZE],
) -> Result<(OpCode, Vec<u8>), RpcError>
where
    R: AsyncRead + Unpin,
{
    reader.read_exact(&mut header[..]).await.map_err(eof_is_closed)?;
    let parsed = decode_header(&header[..])?;
    let len = parsed.payload_len()?;

    let mut payload = vec![0u8; len];
    if len > 0 {
        reader.read_exact(&mut payload).await.map_err(eof_is_closed)?;
    }
    Ok((parsed.op, payload))
}

fn eof_is_closed(e: io::Error) -> RpcError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        RpcError::ConnectionClosed
    } else {
        RpcError::Io(e)
    }
}

/// Decodes a frame body.
///
/// PING and PONG bodies are kept as raw bytes unless they happen to be valid
/// JSON; every other opcode must carry a JSON document.
///
/// # Errors
///
/// Returns [`RpcError::Protocol`] when a JSON body does not decode.
pub fn decode_body(op: OpCode, payload: &[u8]) -> Result<PacketBody, RpcError> {
    if op.is_raw() {
        return Ok(match decode_json(payload) {
            Ok(value) => PacketBody::Json(value),
            Err(_) => PacketBody::Raw(payload.to_vec()),
        });
    }
    Ok(PacketBody::Json(decode_json(payload)?))
}

/// Encodes and writes one frame while holding the write lock.
///
/// The write is abandoned, and the lock released, as soon as the writer is
/// cancelled.
///
/// # Errors
///
/// Returns [`RpcError::ConnectionClosed`] if the writer is cancelled or the
/// write half has been taken, or [`RpcError::Io`] if the write fails.
pub async fn write_frame(
    writer: &SharedWriter,
    op: OpCode,
    payload: &[u8],
) -> Result<(), RpcError> {
    let frame = encode_frame(op, payload);
    let mut cancelled = writer.cancelled.subscribe();
    tokio::select! {
        biased;
        () = until_cancelled(&mut cancelled) => Err(RpcError::ConnectionClosed),
        result = writer.write_locked(&frame) => result,
    }
}

/// Cancels pending writes, then takes the write half out of `writer` and
/// shuts it down.  Idempotent.
pub async fn shutdown_writer(writer: &SharedWriter) {
    writer.cancel();
    let taken = writer.half.lock().await.take();
    if let Some(mut w) = taken {
        // The peer may already be gone; nothing useful to do on failure.
        let _ = w.shutdown().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
