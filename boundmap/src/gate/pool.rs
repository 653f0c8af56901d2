//! Admission gate implementation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};

use super::permit::{GateConnection, GatePermit, PermitToken};
use crate::config::Concurrency;
use crate::error::GateError;

/// Largest number of permits a gate can hold; larger bounds are clamped to it.
pub const MAX_PERMITS: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Counting semaphore bounding the number of concurrent permit holders.
///
/// Tokens are minted lazily: the first `capacity` acquires take a fresh token
/// without touching the channel, so building a gate costs the same for any bound.
/// Once every token has been minted, acquirers wait on the channel for released
/// tokens. Waiters queue on the receiver lock, which tokio serves in FIFO order,
/// so every waiter eventually proceeds once enough permits are released.
pub struct AdmissionGate {
    tokens_rx: Mutex<mpsc::Receiver<PermitToken>>,
    tokens_tx: mpsc::Sender<PermitToken>,
    capacity: usize,
    /// Tokens not yet minted. Only ever decreases.
    unminted: AtomicUsize,
    available: Arc<AtomicUsize>,
}

impl AdmissionGate {
    /// Create a gate holding `permits` permits, all initially available.
    ///
    /// Bounds above [`MAX_PERMITS`] are clamped; no caller can hold that many
    /// permits at once anyway.
    pub fn new(permits: Concurrency) -> Self {
        let requested = permits.get();
        let capacity = requested.min(MAX_PERMITS);
        if capacity < requested {
            tracing::debug!(requested, capacity, "Gate bound clamped to maximum permits");
        }

        // The channel allocates lazily, so its buffer size does not cost memory up front.
        let (tx, rx) = mpsc::channel(capacity);

        Self {
            tokens_rx: Mutex::new(rx),
            tokens_tx: tx,
            capacity,
            unminted: AtomicUsize::new(capacity),
            available: Arc::new(AtomicUsize::new(capacity)),
        }
    }

    /// Wait for a permit and claim it.
    ///
    /// Suspends without polling until a permit is released. Cancel safe: dropping
    /// the returned future before it completes claims nothing.
    ///
    /// The gate owns a sender of its own channel, so `GateError::Closed` cannot
    /// occur while the gate is alive; the error exists only to avoid a panic path.
    pub async fn acquire(&self) -> Result<GatePermit, GateError> {
        let token = match self.mint() {
            Some(token) => token,
            None => {
                let mut rx = self.tokens_rx.lock().await;
                let token = rx.recv().await.ok_or(GateError::Closed)?;
                drop(rx);
                token
            }
        };

        let remaining = self.available.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!(available = remaining, "Permit acquired");
        Ok(GatePermit::new(token, self.connection()))
    }

    /// Claim a permit only if one can be taken without waiting.
    ///
    /// Best effort: while a blocked `acquire` holds the receiver lock this returns
    /// `None`, even in the short window where a released token is queued for that
    /// waiter and `available()` is non-zero. Waiters that arrived first keep priority.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let token = match self.mint() {
            Some(token) => token,
            None => {
                let mut rx = self.tokens_rx.try_lock().ok()?;
                let token = rx.try_recv().ok()?;
                drop(rx);
                token
            }
        };

        self.available.fetch_sub(1, Ordering::AcqRel);
        Some(GatePermit::new(token, self.connection()))
    }

    /// Take a never-used token, if any remain.
    fn mint(&self) -> Option<PermitToken> {
        self.unminted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|_| PermitToken)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    fn connection(&self) -> GateConnection {
        GateConnection {
            tokens_tx: self.tokens_tx.clone(),
            available: Arc::clone(&self.available),
            capacity: self.capacity,
        }
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
