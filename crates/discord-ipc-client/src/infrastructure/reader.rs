//! The background reader loop.
//!
//! Exactly one reader task exists per connection.  It is the only code that
//! reads from the socket and the only owner of the [`Correlator`].  Each
//! iteration:
//!
//! 1. Reads one whole frame (header, then payload).
//! 2. Drains queued registrations from callers.
//! 3. Decodes the body and classifies it: reply, READY, CLOSE, PING or plain
//!    event.
//! 4. Publishes the frame to the [`EventHub`], whatever its class.
//!
//! Any read or decode failure, a CLOSE frame, or the shutdown signal ends the
//! loop.  A PONG stuck on a peer that stopped reading does not pin the loop:
//! `close()` cancels the writer first, which abandons the PONG.  On the way out the connection is marked closed, the write half is
//! shut down, every waiter is rejected with `ConnectionClosed` and every
//! subscriber receives the close marker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use discord_ipc_core::protocol::messages::{CloseReason, Payload};
use discord_ipc_core::{OpCode, HEADER_SIZE};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::application::correlation::{Control, Correlator, Route};
use crate::application::event_hub::EventHub;
use crate::domain::events::{IpcEvent, Packet, PacketBody};
use crate::error::RpcError;
use crate::infrastructure::transport::{
    decode_body, read_frame, shutdown_writer, write_frame, SharedWriter,
};

/// Whether the loop keeps reading after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Why the loop ended.
#[derive(Debug)]
enum Exit {
    Shutdown,
    CloseFrame,
    Failed(RpcError),
}

/// State owned by the reader task.
pub struct ReaderLoop<R> {
    reader: R,
    header: [u8; HEADER_SIZE],
    correlator: Correlator,
    controls: mpsc::UnboundedReceiver<Control>,
    shutdown: watch::Receiver<bool>,
    writer: SharedWriter,
    hub: Arc<EventHub>,
    closed: Arc<AtomicBool>,
}

impl<R> ReaderLoop<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(
        reader: R,
        writer: SharedWriter,
        hub: Arc<EventHub>,
        closed: Arc<AtomicBool>,
        controls: mpsc::UnboundedReceiver<Control>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            reader,
            header: [0u8; HEADER_SIZE],
            correlator: Correlator::new(),
            controls,
            shutdown,
            writer,
            hub,
            closed,
        }
    }

    /// Runs until the connection ends, then releases everything it owns.
    pub async fn run(mut self) {
        let exit = loop {
            let frame = tokio::select! {
                biased;
                // A dropped sender means the connection handle is gone.
                _ = self.shutdown.changed() => break Exit::Shutdown,
                frame = read_frame(&mut self.reader, &mut self.header) => frame,
            };

            let (op, payload) = match frame {
                Ok(frame) => frame,
                Err(e) => break Exit::Failed(e),
            };

            self.drain_controls();
            match self.dispatch(op, payload).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break Exit::CloseFrame,
                Err(e) => break Exit::Failed(e),
            }
        };

        match &exit {
            Exit::Shutdown => debug!("reader stopped by close()"),
            Exit::CloseFrame => info!("IPC connection closed by remote"),
            Exit::Failed(RpcError::ConnectionClosed) => info!("IPC stream ended"),
            Exit::Failed(e) => warn!("reader loop terminated: {e}"),
        }
        self.finish().await;
    }

    fn drain_controls(&mut self) {
        while let Ok(control) = self.controls.try_recv() {
            self.correlator.apply(control);
        }
        self.correlator.prune();
    }

    async fn dispatch(&mut self, op: OpCode, payload: Vec<u8>) -> Result<Flow, RpcError> {
        let body = decode_body(op, &payload)?;
        trace!(op = op.code(), len = payload.len(), "frame received");

        let mut flow = Flow::Continue;
        match (op, &body) {
            (OpCode::Ping, _) => {
                // The PONG echoes the PING payload byte for byte.
                if let Err(e) = write_frame(&self.writer, OpCode::Pong, &payload).await {
                    if self.writer.is_cancelled() {
                        debug!("PONG abandoned: connection closing");
                    } else {
                        warn!("failed to answer PING: {e}");
                    }
                }
            }
            (OpCode::Close, PacketBody::Json(value)) => {
                let reason = CloseReason::from_value(value);
                warn!(code = reason.code, "remote closed: {}", reason.message);
                self.correlator.on_close_frame(&reason);
                flow = Flow::Stop;
            }
            (_, PacketBody::Json(value)) if !op.is_raw() => {
                if let Some(parsed) = Payload::from_value(value) {
                    if self.correlator.route(&parsed) == Route::Unmatched {
                        trace!(cmd = %parsed.cmd, "uncorrelated payload");
                    }
                }
            }
            _ => {}
        }

        self.hub.publish(&IpcEvent::Packet(Packet { op, body }));
        Ok(flow)
    }

    async fn finish(mut self) {
        self.closed.store(true, Ordering::SeqCst);
        shutdown_writer(&self.writer).await;

        // Anything registered before the channel closes is still rejected.
        self.controls.close();
        while let Ok(control) = self.controls.try_recv() {
            self.correlator.apply(control);
        }
        self.correlator.reject_all();
        self.hub.close_all();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
