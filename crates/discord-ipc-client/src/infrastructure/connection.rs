//! The public connection handle.
//!
//! Architecture:
//! - `Connection` owns the write half of the stream behind a mutex, so any
//!   number of tasks may send concurrently without interleaving frames.
//! - The read half is moved into a [`ReaderLoop`] task spawned at
//!   construction time.
//! - Callers that expect an answer (`send_command`, `login`) queue a
//!   registration for the reader, write their frame, and await a one-shot
//!   reply.  There is no built-in timeout; wrap calls in
//!   `tokio::time::timeout` where one is wanted.
//! - Events are consumed through [`Connection::subscribe`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use discord_ipc_core::protocol::messages::{
    new_nonce, Command, CommandEnvelope, Event, Handshake,
};
use discord_ipc_core::OpCode;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::correlation::Control;
use crate::application::event_hub::{EventHub, Subscription};
use crate::domain::config::ClientConfig;
use crate::error::RpcError;
use crate::infrastructure::locator::SocketLocator;
use crate::infrastructure::reader::ReaderLoop;
use crate::infrastructure::transport::{shared_writer, write_frame, SharedWriter};

/// A live IPC connection to the desktop application.
pub struct Connection {
    writer: SharedWriter,
    hub: Arc<EventHub>,
    closed: Arc<AtomicBool>,
    controls: mpsc::UnboundedSender<Control>,
    shutdown: watch::Sender<bool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    login_armed: AtomicBool,
    endpoint: Option<PathBuf>,
}

/// Clears the login flag when the `login` call finishes or is cancelled.
struct LoginGuard<'a>(&'a AtomicBool);

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Connection {
    /// Discovers the endpoint described by `config` and connects to it.
    ///
    /// Every candidate that exists is tried in id order; a socket file left
    /// behind by a crashed client refuses the connection and is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::NoEndpointFound`] if no candidate exists, or the
    /// last [`RpcError::Io`] if every existing candidate refused.
    pub async fn open(config: &ClientConfig) -> Result<Self, RpcError> {
        let locator = SocketLocator::new(config.clone())?;
        let mut last_error = None;
        for path in locator.locate_all()? {
            match Self::connect(&path).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    debug!("skipping {}: {e}", path.display());
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(RpcError::NoEndpointFound {
            searched: locator.candidates().len(),
        }))
    }

    /// Connects to an explicit endpoint, skipping discovery.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Io`] if the connection cannot be established.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, RpcError> {
        let path = path.as_ref();
        let stream = open_stream(path).await?;
        info!("connected to {}", path.display());

        let mut conn = Self::from_stream(stream);
        conn.endpoint = Some(path.to_path_buf());
        Ok(conn)
    }

    /// Adopts an already-connected duplex stream and starts the reader task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let writer = shared_writer(write_half);
        let hub = EventHub::new();
        let closed = Arc::new(AtomicBool::new(false));
        let (controls, controls_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let reader = ReaderLoop::new(
            read_half,
            Arc::clone(&writer),
            Arc::clone(&hub),
            Arc::clone(&closed),
            controls_rx,
            shutdown_rx,
        );
        let reader_task = tokio::spawn(reader.run());

        Self {
            writer,
            hub,
            closed,
            controls,
            shutdown,
            reader_task: Mutex::new(Some(reader_task)),
            login_armed: AtomicBool::new(false),
            endpoint: None,
        }
    }

    /// Path this connection was opened on, if it came from [`connect`](Self::connect).
    pub fn endpoint(&self) -> Option<&Path> {
        self.endpoint.as_deref()
    }

    /// Whether the connection has shut down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), RpcError> {
        if self.is_closed() {
            Err(RpcError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    fn enqueue(&self, control: Control) -> Result<(), RpcError> {
        self.controls
            .send(control)
            .map_err(|_| RpcError::ConnectionClosed)
    }

    /// Performs the HANDSHAKE and waits for the READY dispatch.
    ///
    /// Resolves with READY's `data`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::LoginInProgress`] if another login is still waiting.
    /// - [`RpcError::HandshakeRejected`] if the application closes the
    ///   connection instead, e.g. with code 4000 for an unknown client id.
    /// - [`RpcError::ConnectionClosed`] if the connection ends first.
    pub async fn login(&self, client_id: &str) -> Result<Value, RpcError> {
        self.ensure_open()?;
        if self
            .login_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RpcError::LoginInProgress);
        }
        let _guard = LoginGuard(&self.login_armed);

        let (tx, rx) = oneshot::channel();
        self.enqueue(Control::ArmReady { reply: tx })?;

        let handshake = serde_json::to_vec(&Handshake::new(client_id))?;
        write_frame(&self.writer, OpCode::Handshake, &handshake).await?;
        debug!(client_id, "handshake sent");

        let ready = rx.await.map_err(|_| RpcError::ConnectionClosed)??;
        info!("IPC session ready");
        Ok(ready)
    }

    /// Writes one frame without waiting for a reply.
    ///
    /// `payload` must be a JSON object.  Its `nonce` is reused if present,
    /// otherwise a fresh one is inserted.  The nonce is returned so the
    /// caller can spot the reply on the event stream.
    ///
    /// # Errors
    ///
    /// - [`RpcError::InvalidPayload`] if `payload` is not an object or its
    ///   `nonce` is not a string.
    /// - [`RpcError::ConnectionClosed`] once the connection has closed.
    pub async fn send(&self, op: OpCode, mut payload: Value) -> Result<String, RpcError> {
        self.ensure_open()?;
        if !payload.is_object() {
            return Err(RpcError::InvalidPayload(format!(
                "expected a JSON object, got {payload}"
            )));
        }

        let nonce = match payload.get("nonce") {
            Some(Value::String(nonce)) => nonce.clone(),
            None | Some(Value::Null) => {
                let nonce = new_nonce();
                payload["nonce"] = Value::String(nonce.clone());
                nonce
            }
            Some(other) => {
                return Err(RpcError::InvalidPayload(format!(
                    "nonce must be a string, got {other}"
                )));
            }
        };

        let bytes = serde_json::to_vec(&payload)?;
        write_frame(&self.writer, op, &bytes).await?;
        debug!(op = op.code(), %nonce, "frame sent");
        Ok(nonce)
    }

    /// Sends a command and waits for the reply carrying the same nonce.
    ///
    /// Resolves with the reply's `data`.  `args` must be an object or `null`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Remote`] if the application answers with `evt: "ERROR"`.
    /// - [`RpcError::ConnectionClosed`] if the connection closes first.
    /// - [`RpcError::InvalidPayload`] for non-object `args`.
    pub async fn send_command(
        &self,
        cmd: Command,
        args: Value,
        evt: Option<Event>,
    ) -> Result<Value, RpcError> {
        self.ensure_open()?;
        if !(args.is_object() || args.is_null()) {
            return Err(RpcError::InvalidPayload(format!(
                "command args must be an object, got {args}"
            )));
        }
        let envelope = CommandEnvelope::new(cmd, args, evt);
        let bytes = serde_json::to_vec(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.enqueue(Control::Register {
            nonce: envelope.nonce.clone(),
            reply: tx,
        })?;
        write_frame(&self.writer, OpCode::Message, &bytes).await?;
        debug!(cmd = %envelope.cmd, nonce = %envelope.nonce, "command sent");

        rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }

    /// Starts a new, independent event stream.
    ///
    /// On a closed connection the stream yields only the close marker.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Closes the connection and waits for the reader task to finish.
    ///
    /// Pending commands and a waiting login fail with
    /// [`RpcError::ConnectionClosed`]; every subscriber receives the close
    /// marker.  Calling `close` again is a no-op.
    pub async fn close(&self) {
        let mut task = self.reader_task.lock().await;
        let Some(handle) = task.take() else {
            return;
        };
        // A write stuck on an undrained socket would otherwise hold the
        // writer lock the reader needs in order to finish.
        self.writer.cancel();
        // Errors only if the reader already exited on its own.
        let _ = self.shutdown.send(true);
        if let Err(e) = handle.await {
            warn!("reader task failed: {e}");
        }
        info!("connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Dropping `shutdown` stops the reader once it is back in its select.
        self.writer.cancel();
    }
}

#[cfg(unix)]
async fn open_stream(path: &Path) -> std::io::Result<tokio::net::UnixStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
async fn open_stream(
    path: &Path,
) -> std::io::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
