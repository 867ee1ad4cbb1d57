//! Request/response correlation and the READY gate.
//!
//! The [`Correlator`] is owned by the reader task.  Callers never touch it;
//! they hand it a [`Control`] message carrying a one-shot reply channel and
//! then await that channel.  Registrations are queued before the matching
//! request is written, and the reader drains the queue after every frame it
//! reads, so a registration is always visible before its reply is routed.

use std::collections::HashMap;

use discord_ipc_core::protocol::messages::{CloseReason, Payload};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::RpcError;

/// Completion side of a pending call.
pub type Reply = oneshot::Sender<Result<Value, RpcError>>;

/// Registration sent from a caller to the reader task.
#[derive(Debug)]
pub enum Control {
    /// Await the reply whose `nonce` equals `nonce`.
    Register { nonce: String, reply: Reply },
    /// Await the first READY dispatch.
    ArmReady { reply: Reply },
}

/// How [`Correlator::route`] disposed of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Settled the pending request with the same nonce.
    Reply,
    /// Settled the READY waiter.
    Ready,
    /// Nothing was waiting for this payload.
    Unmatched,
}

/// Pending requests keyed by nonce, plus the optional READY waiter.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: HashMap<String, Reply>,
    ready: Option<Reply>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one control message.
    pub fn apply(&mut self, control: Control) {
        match control {
            Control::Register { nonce, reply } => self.register(nonce, reply),
            Control::ArmReady { reply } => self.arm_ready(reply),
        }
    }

    /// Registers a pending request.
    ///
    /// A nonce that is already pending keeps its first registration; the
    /// newcomer can never be matched and is rejected straight away.
    pub fn register(&mut self, nonce: String, reply: Reply) {
        if self.pending.contains_key(&nonce) {
            warn!(%nonce, "nonce already pending; rejecting duplicate");
            let _ = reply.send(Err(RpcError::InvalidPayload(format!(
                "nonce {nonce} is already awaiting a reply"
            ))));
            return;
        }
        trace!(%nonce, "request registered");
        self.pending.insert(nonce, reply);
    }

    /// Arms the READY waiter.
    ///
    /// If a live waiter is already armed it stays in place and `reply` fails
    /// with [`RpcError::LoginInProgress`].
    pub fn arm_ready(&mut self, reply: Reply) {
        match &self.ready {
            Some(existing) if !existing.is_closed() => {
                let _ = reply.send(Err(RpcError::LoginInProgress));
            }
            _ => self.ready = Some(reply),
        }
    }

    /// Settles whatever is waiting for `payload`.
    ///
    /// A matching nonce always wins.  The READY waiter is consulted only when
    /// no pending request matched, and is disarmed on first use.
    pub fn route(&mut self, payload: &Payload) -> Route {
        if let Some(reply) = payload
            .nonce
            .as_deref()
            .and_then(|nonce| self.pending.remove(nonce))
        {
            let _ = reply.send(settle(payload));
            return Route::Reply;
        }

        if payload.is_ready() || (payload.is_error() && payload.nonce.is_none()) {
            if let Some(reply) = self.ready.take() {
                debug!(cmd = %payload.cmd, "READY gate settled");
                let _ = reply.send(settle(payload));
                return Route::Ready;
            }
        }

        Route::Unmatched
    }

    /// Rejects the READY waiter, if armed, with the reason carried by a
    /// CLOSE frame.
    pub fn on_close_frame(&mut self, reason: &CloseReason) {
        if let Some(reply) = self.ready.take() {
            if reason.is_invalid_client_id() {
                warn!("handshake rejected: unknown client id");
            } else {
                debug!(code = reason.code, "handshake rejected by CLOSE");
            }
            let _ = reply.send(Err(RpcError::HandshakeRejected {
                code: reason.code,
                message: reason.message.clone(),
            }));
        }
    }

    /// Forgets callers that stopped waiting.
    pub fn prune(&mut self) {
        self.pending.retain(|_, reply| !reply.is_closed());
        if self.ready.as_ref().is_some_and(|reply| reply.is_closed()) {
            self.ready = None;
        }
    }

    /// Rejects every pending request and the READY waiter with
    /// [`RpcError::ConnectionClosed`].
    pub fn reject_all(&mut self) {
        let count = self.pending.len() + usize::from(self.ready.is_some());
        if count > 0 {
            debug!(count, "rejecting waiters on close");
        }
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(RpcError::ConnectionClosed));
        }
        if let Some(reply) = self.ready.take() {
            let _ = reply.send(Err(RpcError::ConnectionClosed));
        }
    }

    /// Number of requests awaiting a reply.
    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the READY waiter is armed.
    #[cfg(test)]
    pub(crate) fn is_ready_armed(&self) -> bool {
        self.ready.is_some()
    }
}

fn settle(payload: &Payload) -> Result<Value, RpcError> {
    if payload.is_error() {
        let error = payload.error_data();
        Err(RpcError::Remote {
            code: error.code,
            message: error.message,
        })
    } else {
        Ok(payload.data.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
