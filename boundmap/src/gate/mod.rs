//! Admission gate: a counting semaphore built from a bounded channel of permit tokens.
//!
//! - `acquire` receives a token (suspends while the channel is empty)
//! - `GatePermit::release` / drop sends the token back
//!
//! A permit is an owned value, so each acquire is matched by exactly one release.

mod permit;
mod pool;

pub use permit::GatePermit;
pub use pool::{AdmissionGate, MAX_PERMITS};
