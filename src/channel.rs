//! Single-settlement result channel shared by every request of a bridge.
//!
//! Each request registers a fresh id and gets back a [`Registration`] that
//! resolves exactly once. The page's bindings settle entries by id; the
//! first settlement removes the entry, so a second one for the same id
//! (or one for an id that was never registered) is a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::descriptor::{ErrorDescriptor, SandboxError};
use crate::error::{BridgeError, Result};

/// The one outcome of a sandboxed call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Resolved(Value),
    Rejected(ErrorDescriptor),
    /// The page sent a payload for this id that could not be decoded.
    Malformed(String),
}

/// Registry of in-flight requests, keyed by correlation id.
#[derive(Debug, Default)]
pub struct PendingResults {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<Outcome>>>,
}

impl PendingResults {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new request and returns its receiving half.
    pub fn register(self: &Arc<Self>) -> Registration {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        Registration {
            id,
            rx: Some(rx),
            registry: Arc::clone(self),
        }
    }

    /// Delivers `outcome` to the request `id`.
    ///
    /// Returns false when the id is unknown or was already settled.
    pub fn settle(&self, id: Uuid, outcome: Outcome) -> bool {
        let Some(tx) = self.pending.lock().remove(&id) else {
            debug!(%id, "Ignoring settlement for unknown or already settled request");
            return false;
        };
        // The receiver may be gone if the request was cancelled meanwhile
        tx.send(outcome).is_ok()
    }

    /// Number of requests still waiting for an outcome.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&self, id: &Uuid) {
        self.pending.lock().remove(id);
    }
}

/// Receiving half of one request. Dropping it unregisters the request.
#[derive(Debug)]
pub struct Registration {
    id: Uuid,
    rx: Option<oneshot::Receiver<Outcome>>,
    registry: Arc<PendingResults>,
}

impl Registration {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the page to settle this request.
    pub async fn outcome(mut self) -> Result<Value> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| BridgeError::Protocol("result already consumed".to_string()))?;
        match rx.await {
            Ok(Outcome::Resolved(value)) => Ok(value),
            Ok(Outcome::Rejected(descriptor)) => {
                Err(BridgeError::Script(SandboxError::from(descriptor)))
            }
            Ok(Outcome::Malformed(reason)) => Err(BridgeError::Protocol(reason)),
            Err(_) => Err(BridgeError::Protocol(format!(
                "result channel for request {} closed without an outcome",
                self.id
            ))),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.forget(&self.id);
    }
}
