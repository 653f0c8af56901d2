//! Permit handed out by the admission gate.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

/// Token circulating through the gate's channel. One token = one permit.
#[derive(Debug)]
pub(crate) struct PermitToken;

/// The parts of the gate a permit needs to give its token back.
pub(crate) struct GateConnection {
    pub tokens_tx: mpsc::Sender<PermitToken>,
    pub available: Arc<AtomicUsize>,
    pub capacity: usize,
}

impl GateConnection {
    fn give_back(&self, token: PermitToken) {
        // Count before sending: `available` must never trail the tokens in the channel,
        // otherwise a concurrent acquire could decrement it below zero.
        let previous = self.available.fetch_add(1, Ordering::AcqRel);
        if previous >= self.capacity {
            self.available.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(
                capacity = self.capacity,
                "Permit released into a full gate - dropping token"
            );
            return;
        }

        if let Err(e) = self.tokens_tx.try_send(token) {
            self.available.fetch_sub(1, Ordering::AcqRel);
            tracing::error!(capacity = self.capacity, error = %e, "Failed to return permit to gate");
            return;
        }

        tracing::trace!(available = previous + 1, "Permit released");
    }
}

/// An acquired permit. Returns to the gate on [`release`](GatePermit::release) or drop,
/// whichever comes first, so every exit path (including unwinding) gives it back.
#[must_use = "dropping a GatePermit releases it immediately"]
pub struct GatePermit {
    token: Option<PermitToken>,
    gate: GateConnection,
}

impl GatePermit {
    pub(crate) fn new(token: PermitToken, gate: GateConnection) -> Self {
        Self {
            token: Some(token),
            gate,
        }
    }

    /// Return the permit to the gate, potentially waking one waiter.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(token) = self.token.take() {
            self.gate.give_back(token);
        }
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl fmt::Debug for GatePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatePermit")
            .field("held", &self.token.is_some())
            .field("capacity", &self.gate.capacity)
            .finish()
    }
}
