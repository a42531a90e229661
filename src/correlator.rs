//! Nonce-keyed request/response correlation.
//!
//! Every outgoing command carries a fresh random nonce. The correlator keeps
//! one single-use slot per nonce; the router task fulfills the slot when a
//! frame with the same nonce arrives.
//!
//! ```text
//!  caller task                     router task
//!  ───────────                     ───────────
//!  register() ──► pending: HashMap<nonce, oneshot::Sender>
//!  write frame                         │
//!  PendingRequest.await ◄── resolve(frame) removes + sends
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{IpcError, Result};
use crate::protocol::Frame;

/// Number of random bytes in a nonce (hex-encoded to 64 chars).
pub const NONCE_BYTES: usize = 32;

/// Generate a fresh 256-bit nonce as lowercase hex.
pub fn generate_nonce() -> String {
    let bytes: [u8; NONCE_BYTES] = rand::random();
    hex::encode(bytes)
}

/// An in-flight request waiting for the frame that carries its nonce.
///
/// Resolves to the response frame, or [`IpcError::ConnectionClosed`] if the
/// connection ended (or the request was cancelled) first.
#[derive(Debug)]
pub struct PendingRequest {
    nonce: String,
    rx: oneshot::Receiver<Frame>,
}

impl PendingRequest {
    /// The nonce this request is keyed by.
    pub fn nonce(&self) -> &str {
        &self.nonce
    }
}

impl Future for PendingRequest {
    type Output = Result<Frame>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| IpcError::ConnectionClosed))
    }
}

/// Map of outstanding requests, shared by callers and the router.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: Mutex<HashMap<String, oneshot::Sender<Frame>>>,
}

impl RequestCorrelator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request under a freshly generated nonce.
    pub fn register(&self) -> PendingRequest {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();

        // Nonces must stay unique among pending requests
        let mut nonce = generate_nonce();
        while pending.contains_key(&nonce) {
            nonce = generate_nonce();
        }

        pending.insert(nonce.clone(), tx);
        tracing::trace!(nonce = %nonce, pending = pending.len(), "Registered pending request");
        PendingRequest { nonce, rx }
    }

    /// Route a frame to its waiter.
    ///
    /// Returns `true` if the frame's nonce matched an outstanding request.
    /// Frames without a nonce, or with an unknown one, are ignored.
    pub fn resolve(&self, frame: &Frame) -> bool {
        let Some(nonce) = frame.nonce() else {
            return false;
        };

        let waiter = self.pending.lock().remove(nonce);
        match waiter {
            Some(tx) => {
                tracing::debug!(nonce = %nonce, cmd = ?frame.cmd(), "Resolved pending request");
                // The caller may have stopped waiting; that is not our concern.
                let _ = tx.send(frame.clone());
                true
            }
            None => {
                tracing::debug!(nonce = %nonce, "Dropping frame with unknown nonce");
                false
            }
        }
    }

    /// Forget a request; its [`PendingRequest`] resolves to `ConnectionClosed`.
    pub fn cancel(&self, nonce: &str) -> bool {
        self.pending.lock().remove(nonce).is_some()
    }

    /// Drop every outstanding request.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if !drained.is_empty() {
            tracing::warn!(count = drained.len(), "Failing outstanding requests");
        }
        drained.len()
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Nonces of outstanding requests, sorted (for diagnostics).
    pub fn pending_nonces(&self) -> Vec<String> {
        let mut nonces: Vec<String> = self.pending.lock().keys().cloned().collect();
        nonces.sort_unstable();
        nonces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Opcode;
    use serde_json::json;
    use std::sync::Arc;

    fn reply(nonce: &str, value: i64) -> Frame {
        Frame::new(Opcode::Frame, json!({"nonce": nonce, "data": {"value": value}}))
    }

    #[test]
    fn test_nonce_format() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_BYTES * 2);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(nonce, generate_nonce());
    }

    #[tokio::test]
    async fn test_resolve_fulfills_once() {
        let correlator = RequestCorrelator::new();
        let request = correlator.register();
        let nonce = request.nonce().to_string();

        assert!(correlator.resolve(&reply(&nonce, 1)));
        assert!(!correlator.resolve(&reply(&nonce, 2)));
        assert_eq!(correlator.pending_count(), 0);

        let frame = request.await.unwrap();
        assert_eq!(frame.data().unwrap()["value"], 1);
    }

    #[tokio::test]
    async fn test_unmatched_nonce_is_noop() {
        let correlator = RequestCorrelator::new();
        let request = correlator.register();

        assert!(!correlator.resolve(&reply("deadbeef", 7)));
        assert!(!correlator.resolve(&Frame::new(Opcode::Frame, json!({"evt": "READY"}))));
        assert_eq!(correlator.pending_count(), 1);

        let nonce = request.nonce().to_string();
        assert!(correlator.resolve(&reply(&nonce, 3)));
        assert_eq!(request.await.unwrap().data().unwrap()["value"], 3);
    }

    #[tokio::test]
    async fn test_concurrent_requests_resolve_to_own_response() {
        let correlator = Arc::new(RequestCorrelator::new());

        let requests: Vec<PendingRequest> = (0..32).map(|_| correlator.register()).collect();
        let nonces: Vec<String> = requests.iter().map(|r| r.nonce().to_string()).collect();

        let waiters: Vec<_> = requests
            .into_iter()
            .enumerate()
            .map(|(i, request)| tokio::spawn(async move { (i, request.await.unwrap()) }))
            .collect();

        // Deliver in reverse, interleaved order from another task.
        let router = correlator.clone();
        let delivery = nonces.clone();
        tokio::spawn(async move {
            for (i, nonce) in delivery.iter().enumerate().rev().step_by(2) {
                router.resolve(&reply(nonce, i as i64));
            }
            for (i, nonce) in delivery.iter().enumerate().rev().skip(1).step_by(2) {
                router.resolve(&reply(nonce, i as i64));
            }
        });

        for waiter in waiters {
            let (i, frame) = waiter.await.unwrap();
            assert_eq!(frame.nonce(), Some(nonces[i].as_str()));
            assert_eq!(frame.data().unwrap()["value"], i as i64);
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_closes_request() {
        let correlator = RequestCorrelator::new();
        let request = correlator.register();

        assert!(correlator.cancel(request.nonce()));
        assert!(matches!(request.await, Err(IpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_fail_all_closes_every_request() {
        let correlator = RequestCorrelator::new();
        let first = correlator.register();
        let second = correlator.register();

        assert_eq!(correlator.pending_nonces().len(), 2);
        assert_eq!(correlator.fail_all(), 2);

        assert!(matches!(first.await, Err(IpcError::ConnectionClosed)));
        assert!(matches!(second.await, Err(IpcError::ConnectionClosed)));
    }
}
